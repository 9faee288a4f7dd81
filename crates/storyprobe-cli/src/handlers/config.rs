//! Config command handler

use storyprobe::ProbeConfig;

use crate::commands::{ConfigArgs, OutputFormat};
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};

/// Execute the config command
pub fn execute_config(config: &CliConfig, args: &ConfigArgs) -> CliResult<()> {
    let probe = config.probe_config()?;
    print!("{}", render_config(&probe, args.format)?);
    Ok(())
}

/// Serialize the resolved configuration
pub fn render_config(probe: &ProbeConfig, format: OutputFormat) -> CliResult<String> {
    match format {
        OutputFormat::Yaml => {
            serde_yaml_ng::to_string(probe).map_err(|e| CliError::render(e.to_string()))
        }
        OutputFormat::Json => serde_json::to_string_pretty(probe)
            .map(|s| s + "\n")
            .map_err(|e| CliError::render(e.to_string())),
    }
}
