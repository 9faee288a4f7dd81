//! Result and error types for Storyprobe.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for Storyprobe operations
pub type ProbeResult<T> = Result<T, ProbeError>;

/// Errors that can occur in Storyprobe
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Browser launch error
    #[error("Failed to launch browser: {message}")]
    BrowserLaunch {
        /// Error message
        message: String,
    },

    /// Story page did not become ready in time
    #[error("Navigation to {url} timed out after {ms}ms")]
    NavigationTimeout {
        /// URL that was requested
        url: String,
        /// Timeout in milliseconds
        ms: u64,
    },

    /// Navigation rejected by the browser
    #[error("Navigation to {url} failed: {message}")]
    NavigationFailed {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// In-page script did not return in time
    #[error("Script `{script}` timed out after {ms}ms")]
    ScriptTimeout {
        /// Script kind
        script: String,
        /// Timeout in milliseconds
        ms: u64,
    },

    /// In-page script threw or returned an unexpected shape
    #[error("Script `{script}` failed: {message}")]
    ScriptFailed {
        /// Script kind
        script: String,
        /// Error message
        message: String,
    },

    /// No element matched the selector in the story document
    #[error("No element matches selector `{selector}`")]
    SelectorNotFound {
        /// CSS selector
        selector: String,
    },

    /// Neither the story-store API nor the controls panel knows this control
    #[error("Control `{control}` not found for story {story}")]
    ControlNotFound {
        /// Control name
        control: String,
        /// Story identifier
        story: String,
    },

    /// Screenshot and baseline have different sizes
    #[error("Image dimensions differ: baseline {baseline_width}x{baseline_height}, actual {actual_width}x{actual_height}")]
    DimensionMismatch {
        /// Baseline width
        baseline_width: u32,
        /// Baseline height
        baseline_height: u32,
        /// Captured width
        actual_width: u32,
        /// Captured height
        actual_height: u32,
    },

    /// Visual comparison over threshold
    #[error("Screenshot {name} differs by {ratio:.4} (threshold {threshold})")]
    VisualMismatch {
        /// Baseline name
        name: String,
        /// Fraction of differing pixels
        ratio: f64,
        /// Allowed fraction
        threshold: f64,
    },

    /// Structural snapshot differs from its baseline
    #[error("Snapshot {name} differs at {} path(s): {}", paths.len(), paths.join(", "))]
    StructuralDifference {
        /// Snapshot name
        name: String,
        /// Every differing path
        paths: Vec<String>,
    },

    /// Measured value outside the allowed tolerance
    #[error("{key}: expected {expected}, got {actual}{}", tolerance.map(|t| format!(" (tolerance {t})")).unwrap_or_default())]
    ToleranceExceeded {
        /// What was compared (`selector.property`)
        key: String,
        /// Expected value
        expected: String,
        /// Actual value
        actual: String,
        /// Tolerance, `None` for an exact match
        tolerance: Option<f64>,
    },

    /// Several property checks failed at once
    #[error("{} property check(s) failed: {}", failures.len(), failures.join("; "))]
    PropertyMismatches {
        /// One message per failed check
        failures: Vec<String>,
    },

    /// Text content check failed
    #[error("Text of `{selector}` was {actual:?}, expected {expected:?} ({mode})")]
    TextMismatch {
        /// CSS selector
        selector: String,
        /// Expected text
        expected: String,
        /// Actual text
        actual: String,
        /// `exact` or `contains`
        mode: &'static str,
    },

    /// Malformed story identifier
    #[error("Invalid story id `{id}`: expected <component>--<variant> in kebab case")]
    InvalidStoryId {
        /// Rejected input
        id: String,
    },

    /// Unparseable CSS color
    #[error("Invalid color `{input}`")]
    InvalidColor {
        /// Rejected input
        input: String,
    },

    /// Baseline name cannot be used as a file name
    #[error("Invalid baseline name `{name}`")]
    InvalidBaselineName {
        /// Rejected name
        name: String,
    },

    /// Baseline file is missing
    #[error("Baseline not found: {path:?}")]
    BaselineNotFound {
        /// Expected location
        path: PathBuf,
    },

    /// Baseline exists and overwriting was not requested
    #[error("Baseline already exists: {path:?}")]
    BaselineExists {
        /// Existing file
        path: PathBuf,
    },

    /// Image decode/encode error
    #[error("Image processing failed: {message}")]
    Image {
        /// Error message
        message: String,
    },

    /// Invalid configuration
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl ProbeError {
    /// Build a [`ProbeError::Config`]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Build a [`ProbeError::ScriptFailed`]
    pub fn script(script: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ScriptFailed {
            script: script.into(),
            message: message.into(),
        }
    }
}

impl From<image::ImageError> for ProbeError {
    fn from(err: image::ImageError) -> Self {
        Self::Image {
            message: err.to_string(),
        }
    }
}
