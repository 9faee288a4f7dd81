//! Storyprobe CLI
//!
//! ## Usage
//!
//! ```bash
//! storyprobe config --format json                 # Resolved configuration
//! storyprobe baselines list --kind visual         # Stored screenshots
//! storyprobe baselines remove example-button--primary default
//! storyprobe diff image base.png new.png --diff-out diff.png
//! storyprobe diff snapshot base.json new.json
//! ```

use clap::Parser;
use std::process::ExitCode;
use storyprobe::{init_logging, LogFormat};
use storyprobe_cli::{
    handlers, BaselinesCommand, Cli, CliConfig, CliResult, Commands, DiffCommand, Verbosity,
};

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();

    let config = build_config(&cli);
    config.color.apply();
    init_logging(LogFormat::Pretty, config.verbosity.log_filter());

    match cli.command {
        Commands::Config(args) => handlers::config::execute_config(&config, &args),
        Commands::Baselines(BaselinesCommand::List(args)) => {
            handlers::baselines::execute_list(&config, &args)
        }
        Commands::Baselines(BaselinesCommand::Remove(args)) => {
            handlers::baselines::execute_remove(&config, &args)
        }
        Commands::Diff(DiffCommand::Image(args)) => handlers::diff::execute_image(&config, &args),
        Commands::Diff(DiffCommand::Snapshot(args)) => {
            handlers::diff::execute_snapshot(&config, &args)
        }
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    CliConfig::new()
        .with_verbosity(Verbosity::from_flags(cli.verbose, cli.quiet))
        .with_color(cli.color.into())
        .with_config_path(cli.config.clone())
}
