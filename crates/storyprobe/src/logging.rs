//! Log subscriber setup.
//!
//! Library code only emits `tracing` events. Binaries and test harnesses call
//! [`init_logging`] once to print them; `RUST_LOG` overrides the default filter.

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable, one line per event
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

/// Install a global fmt subscriber.
///
/// Returns `false` when a subscriber was already installed, which is the
/// normal case when several tests share a process.
pub fn init_logging(format: LogFormat, default_filter: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Pretty => builder.try_init().is_ok(),
        LogFormat::Json => builder.json().try_init().is_ok(),
    }
}

/// Default filter for a verbosity count (`-v`, `-vv`)
#[must_use]
pub const fn filter_for_verbosity(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "storyprobe=error";
    }
    match verbose {
        0 => "storyprobe=info",
        1 => "storyprobe=debug",
        _ => "storyprobe=trace",
    }
}
