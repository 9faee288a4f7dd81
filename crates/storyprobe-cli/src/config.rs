//! CLI configuration

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use storyprobe::ProbeConfig;

use crate::error::CliResult;

/// CLI verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Verbosity {
    /// Quiet - errors only
    Quiet,
    /// Normal - default output
    #[default]
    Normal,
    /// Verbose - extra output
    Verbose,
    /// Debug - maximum output
    Debug,
}

impl Verbosity {
    /// Map `-q` and the `-v` count to a level
    #[must_use]
    pub const fn from_flags(verbose: u8, quiet: bool) -> Self {
        if quiet {
            return Self::Quiet;
        }
        match verbose {
            0 => Self::Normal,
            1 => Self::Verbose,
            _ => Self::Debug,
        }
    }

    /// Check if quiet mode
    #[must_use]
    pub const fn is_quiet(self) -> bool {
        matches!(self, Self::Quiet)
    }

    /// Check if verbose or higher
    #[must_use]
    pub const fn is_verbose(self) -> bool {
        matches!(self, Self::Verbose | Self::Debug)
    }

    /// Log filter for the library at this level
    #[must_use]
    pub const fn log_filter(self) -> &'static str {
        match self {
            Self::Quiet => storyprobe::logging::filter_for_verbosity(0, true),
            Self::Normal => storyprobe::logging::filter_for_verbosity(0, false),
            Self::Verbose => storyprobe::logging::filter_for_verbosity(1, false),
            Self::Debug => storyprobe::logging::filter_for_verbosity(2, false),
        }
    }
}

/// Color output choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColorChoice {
    /// Always use colors
    Always,
    /// Use colors when output is a terminal
    #[default]
    Auto,
    /// Never use colors
    Never,
}

impl ColorChoice {
    /// Apply the choice to `console` styling
    pub fn apply(self) {
        match self {
            Self::Always => console::set_colors_enabled(true),
            Self::Never => console::set_colors_enabled(false),
            Self::Auto => {}
        }
    }
}

/// CLI configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// Verbosity level
    pub verbosity: Verbosity,
    /// Color output choice
    pub color: ColorChoice,
    /// Explicit `storyprobe.yaml`
    pub config_path: Option<PathBuf>,
}

impl CliConfig {
    /// Default file looked up in the working directory
    pub const DEFAULT_FILE: &str = "storyprobe.yaml";

    /// Create new default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set verbosity
    #[must_use]
    pub const fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set color choice
    #[must_use]
    pub const fn with_color(mut self, color: ColorChoice) -> Self {
        self.color = color;
        self
    }

    /// Set the config file
    #[must_use]
    pub fn with_config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    /// The file to load: the explicit one, else `storyprobe.yaml` if present
    #[must_use]
    pub fn config_file(&self) -> Option<PathBuf> {
        self.config_path.clone().or_else(|| {
            let default = Path::new(Self::DEFAULT_FILE);
            default.is_file().then(|| default.to_path_buf())
        })
    }

    /// Resolve the library configuration: file, then environment
    pub fn probe_config(&self) -> CliResult<ProbeConfig> {
        let file = self.config_file();
        tracing::debug!(file = ?file, "loading configuration");
        Ok(ProbeConfig::load(file.as_deref())?)
    }
}
