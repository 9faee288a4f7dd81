//! CLI command definitions using clap

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use storyprobe::BaselineKind;

/// Storyprobe: baseline management and offline diffs for Storybook component tests
#[derive(Parser, Debug)]
#[command(name = "storyprobe")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Configuration file (defaults to ./storyprobe.yaml when present)
    #[arg(long, global = true, env = "STORYPROBE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the resolved configuration
    Config(ConfigArgs),

    /// Manage stored baselines
    #[command(subcommand)]
    Baselines(BaselinesCommand),

    /// Compare baselines offline
    #[command(subcommand)]
    Diff(DiffCommand),
}

/// Arguments for the config command
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Output format
    #[arg(short, long, default_value = "yaml")]
    pub format: OutputFormat,
}

/// Baseline subcommands
#[derive(Subcommand, Debug)]
pub enum BaselinesCommand {
    /// List stored baselines
    List(ListArgs),
    /// Delete baselines so the next run regenerates them
    Remove(RemoveArgs),
}

/// Arguments for `baselines list`
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only this kind
    #[arg(short, long)]
    pub kind: Option<KindArg>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: ListFormat,
}

/// Arguments for `baselines remove`
#[derive(Args, Debug)]
pub struct RemoveArgs {
    /// Story identifier, e.g. `example-button--primary`
    pub story: String,

    /// Baseline name; all baselines of the story when omitted
    pub name: Option<String>,

    /// Only this kind
    #[arg(short, long)]
    pub kind: Option<KindArg>,
}

/// Offline comparisons
#[derive(Subcommand, Debug)]
pub enum DiffCommand {
    /// Pixel comparison of two PNG files
    Image(ImageDiffArgs),
    /// Structural comparison of two snapshot JSON files
    Snapshot(SnapshotDiffArgs),
}

/// Arguments for `diff image`
#[derive(Args, Debug)]
pub struct ImageDiffArgs {
    /// Baseline PNG
    pub baseline: PathBuf,

    /// Candidate PNG
    pub candidate: PathBuf,

    /// Maximum fraction of differing pixels (0.0-1.0); config value when omitted
    #[arg(short, long)]
    pub threshold: Option<f64>,

    /// Summed channel difference a pixel may have and still match
    #[arg(long, default_value = "0")]
    pub color_threshold: u32,

    /// Write the diff image here on mismatch
    #[arg(long)]
    pub diff_out: Option<PathBuf>,
}

/// Arguments for `diff snapshot`
#[derive(Args, Debug)]
pub struct SnapshotDiffArgs {
    /// Baseline snapshot JSON
    pub baseline: PathBuf,

    /// Candidate snapshot JSON
    pub candidate: PathBuf,
}

/// Serialization format for `config`
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// YAML
    #[default]
    Yaml,
    /// JSON
    Json,
}

/// Output format for `baselines list`
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ListFormat {
    /// One line per baseline
    #[default]
    Text,
    /// JSON array
    Json,
}

/// Baseline kind argument
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum KindArg {
    /// PNG screenshots
    Visual,
    /// JSON structural snapshots
    Structural,
}

impl From<KindArg> for BaselineKind {
    fn from(arg: KindArg) -> Self {
        match arg {
            KindArg::Visual => Self::Visual,
            KindArg::Structural => Self::Structural,
        }
    }
}

/// Kinds selected by an optional `--kind`
#[must_use]
pub fn selected_kinds(kind: Option<KindArg>) -> Vec<BaselineKind> {
    kind.map_or_else(|| BaselineKind::ALL.to_vec(), |k| vec![k.into()])
}

/// Color output argument
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    mod cli_tests {
        use super::*;

        #[test]
        fn test_parse_config_command() {
            let cli = Cli::parse_from(["storyprobe", "config", "--format", "json"]);
            match cli.command {
                Commands::Config(args) => assert_eq!(args.format, OutputFormat::Json),
                other => panic!("expected config, got {other:?}"),
            }
        }

        #[test]
        fn test_global_flags() {
            let cli = Cli::parse_from(["storyprobe", "-vv", "--color", "never", "config"]);
            assert_eq!(cli.verbose, 2);
            assert!(!cli.quiet);
            assert!(matches!(cli.color, ColorArg::Never));
        }

        #[test]
        fn test_parse_baselines_remove() {
            let cli = Cli::parse_from([
                "storyprobe",
                "baselines",
                "remove",
                "example-button--primary",
                "default",
                "--kind",
                "visual",
            ]);
            match cli.command {
                Commands::Baselines(BaselinesCommand::Remove(args)) => {
                    assert_eq!(args.story, "example-button--primary");
                    assert_eq!(args.name.as_deref(), Some("default"));
                    assert_eq!(args.kind, Some(KindArg::Visual));
                }
                other => panic!("expected baselines remove, got {other:?}"),
            }
        }

        #[test]
        fn test_parse_diff_image() {
            let cli = Cli::parse_from([
                "storyprobe",
                "diff",
                "image",
                "a.png",
                "b.png",
                "--threshold",
                "0.1",
                "--diff-out",
                "d.png",
            ]);
            match cli.command {
                Commands::Diff(DiffCommand::Image(args)) => {
                    assert_eq!(args.threshold, Some(0.1));
                    assert_eq!(args.color_threshold, 0);
                    assert_eq!(args.diff_out, Some(PathBuf::from("d.png")));
                }
                other => panic!("expected diff image, got {other:?}"),
            }
        }

        #[test]
        fn test_subcommand_required() {
            assert!(Cli::try_parse_from(["storyprobe"]).is_err());
        }
    }

    mod kind_tests {
        use super::*;

        #[test]
        fn test_selected_kinds() {
            assert_eq!(selected_kinds(None), BaselineKind::ALL.to_vec());
            assert_eq!(
                selected_kinds(Some(KindArg::Structural)),
                vec![BaselineKind::Structural]
            );
        }
    }
}
