//! Runtime configuration.
//!
//! Values come from three layers, each overriding the previous one:
//!
//! 1. built-in defaults,
//! 2. an optional YAML file (`storyprobe.yaml`),
//! 3. environment variables (`STORYBOOK_URL`, `BROWSER`, `HEADLESS`, ...).
//!
//! Relative directories in a file are resolved against the file's directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::result::{ProbeError, ProbeResult};

/// Default Storybook URL
pub const DEFAULT_STORYBOOK_URL: &str = "http://localhost:6006";

/// Default timeout for navigation and scripts in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Default fraction of pixels allowed to differ
pub const DEFAULT_VISUAL_THRESHOLD: f64 = 0.2;

/// Conventional config file name
pub const CONFIG_FILE_NAME: &str = "storyprobe.yaml";

/// Browser engine used to render stories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserEngine {
    /// Chromium over CDP
    #[default]
    Chromium,
    /// Firefox
    Firefox,
}

impl BrowserEngine {
    /// Parse an engine name (case-insensitive)
    pub fn parse(name: &str) -> ProbeResult<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Ok(Self::Chromium),
            "firefox" => Ok(Self::Firefox),
            other => Err(ProbeError::config(format!("unknown browser engine `{other}`"))),
        }
    }

    /// Engine tried when this one cannot be launched
    #[must_use]
    pub const fn fallback(self) -> Self {
        match self {
            Self::Chromium => Self::Firefox,
            Self::Firefox => Self::Chromium,
        }
    }
}

/// How much of the page a default screenshot covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScreenshotMode {
    /// Whole scrollable page
    #[default]
    Full,
    /// Visible viewport only
    Viewport,
}

/// Viewport size in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    /// Width
    pub width: u32,
    /// Height
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}

/// Storybook server settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorybookSettings {
    /// Base URL of the running Storybook
    pub url: String,
    /// Timeout for navigation and script evaluation
    pub timeout_ms: u64,
}

impl Default for StorybookSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_STORYBOOK_URL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

/// Browser settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// Primary engine
    pub engine: BrowserEngine,
    /// Run without a window
    pub headless: bool,
    /// Delay after each navigation and mutation
    pub slow_mo_ms: u64,
    /// Viewport size
    pub viewport: Viewport,
    /// Explicit browser executable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executable: Option<PathBuf>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            engine: BrowserEngine::default(),
            headless: true,
            slow_mo_ms: 0,
            viewport: Viewport::default(),
            executable: None,
        }
    }
}

/// Visual regression settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualSettings {
    /// Default fraction of differing pixels tolerated (0.0 - 1.0)
    pub threshold: f64,
    /// Default capture area
    pub screenshot_mode: ScreenshotMode,
    /// Overwrite baselines instead of comparing
    pub update_baselines: bool,
}

impl Default for VisualSettings {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_VISUAL_THRESHOLD,
            screenshot_mode: ScreenshotMode::default(),
            update_baselines: false,
        }
    }
}

/// Baseline directories
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    /// PNG baselines
    pub screenshots_dir: PathBuf,
    /// JSON structural baselines
    pub snapshots_dir: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            screenshots_dir: PathBuf::from("screenshots"),
            snapshots_dir: PathBuf::from("snapshots"),
        }
    }
}

/// Complete Storyprobe configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Storybook server
    pub storybook: StorybookSettings,
    /// Browser
    pub browser: BrowserSettings,
    /// Visual regression
    pub visual: VisualSettings,
    /// Baseline locations
    pub paths: PathSettings,
}

impl ProbeConfig {
    /// Create a config with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the Storybook base URL
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.storybook.url = url.into();
        self
    }

    /// Set the navigation/script timeout
    #[must_use]
    pub const fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.storybook.timeout_ms = ms;
        self
    }

    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.browser.headless = headless;
        self
    }

    /// Set slow-motion delay
    #[must_use]
    pub const fn with_slow_mo_ms(mut self, ms: u64) -> Self {
        self.browser.slow_mo_ms = ms;
        self
    }

    /// Set viewport size
    #[must_use]
    pub const fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.browser.viewport = Viewport { width, height };
        self
    }

    /// Set the default visual threshold
    #[must_use]
    pub const fn with_threshold(mut self, threshold: f64) -> Self {
        self.visual.threshold = threshold;
        self
    }

    /// Enable baseline update mode
    #[must_use]
    pub const fn with_update_baselines(mut self, update: bool) -> Self {
        self.visual.update_baselines = update;
        self
    }

    /// Put both baseline directories under `root`
    #[must_use]
    pub fn with_baseline_root(mut self, root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        self.paths.screenshots_dir = root.join("screenshots");
        self.paths.snapshots_dir = root.join("snapshots");
        self
    }

    /// Parse a YAML document. Missing keys keep their defaults.
    pub fn from_yaml_str(yaml: &str) -> ProbeResult<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml_ng::from_str(yaml)?)
    }

    /// Load a YAML file and resolve relative directories against its parent
    pub fn from_file(path: impl AsRef<Path>) -> ProbeResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml_str(&text)?;
        if let Some(dir) = path.parent() {
            config.resolve_paths(dir);
        }
        Ok(config)
    }

    /// Load from defaults, an optional file and the process environment, then validate
    pub fn load(path: Option<&Path>) -> ProbeResult<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Make relative baseline directories absolute under `base`
    pub fn resolve_paths(&mut self, base: &Path) {
        for dir in [&mut self.paths.screenshots_dir, &mut self.paths.snapshots_dir] {
            if dir.is_relative() {
                *dir = base.join(&*dir);
            }
        }
    }

    /// Apply environment overrides through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> ProbeResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("STORYBOOK_URL") {
            self.storybook.url = v;
        }
        if let Some(v) = lookup("STORYBOOK_TIMEOUT") {
            self.storybook.timeout_ms = parse_number("STORYBOOK_TIMEOUT", &v)?;
        }
        if let Some(v) = lookup("BROWSER") {
            self.browser.engine = BrowserEngine::parse(&v)?;
        }
        if let Some(v) = lookup("HEADLESS") {
            self.browser.headless = parse_bool(&v);
        }
        if let Some(v) = lookup("SLOW_MO") {
            self.browser.slow_mo_ms = parse_number("SLOW_MO", &v)?;
        }
        if let Some(v) = lookup("VIEWPORT_WIDTH") {
            self.browser.viewport.width = parse_number("VIEWPORT_WIDTH", &v)?;
        }
        if let Some(v) = lookup("VIEWPORT_HEIGHT") {
            self.browser.viewport.height = parse_number("VIEWPORT_HEIGHT", &v)?;
        }
        if let Some(v) = lookup("CHROME_PATH") {
            self.browser.executable = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("VISUAL_THRESHOLD") {
            self.visual.threshold = parse_number("VISUAL_THRESHOLD", &v)?;
        }
        if let Some(v) = lookup("SCREENSHOT_MODE") {
            self.visual.screenshot_mode = match v.trim().to_ascii_lowercase().as_str() {
                "full" => ScreenshotMode::Full,
                "viewport" => ScreenshotMode::Viewport,
                other => {
                    return Err(ProbeError::config(format!(
                        "SCREENSHOT_MODE must be `full` or `viewport`, got `{other}`"
                    )))
                }
            };
        }
        if let Some(v) = lookup("UPDATE_BASELINES") {
            self.visual.update_baselines = parse_bool(&v);
        }
        if let Some(v) = lookup("SCREENSHOTS_DIR") {
            self.paths.screenshots_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("SNAPSHOTS_DIR") {
            self.paths.snapshots_dir = PathBuf::from(v);
        }
        Ok(())
    }

    /// Reject values no run can work with
    pub fn validate(&self) -> ProbeResult<()> {
        if self.storybook.url.trim().is_empty() {
            return Err(ProbeError::config("storybook.url must not be empty"));
        }
        if self.storybook.timeout_ms == 0 {
            return Err(ProbeError::config("storybook.timeout_ms must be positive"));
        }
        if !(0.0..=1.0).contains(&self.visual.threshold) {
            return Err(ProbeError::config(format!(
                "visual.threshold must be within 0.0..=1.0, got {}",
                self.visual.threshold
            )));
        }
        let vp = self.browser.viewport;
        if vp.width == 0 || vp.height == 0 {
            return Err(ProbeError::config("browser.viewport must be non-zero"));
        }
        Ok(())
    }

    /// Base URL without a trailing slash
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.storybook.url.trim_end_matches('/')
    }

    /// Timeout as a [`std::time::Duration`]
    #[must_use]
    pub const fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.storybook.timeout_ms)
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> ProbeResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ProbeError::config(format!("{key} has invalid value `{value}`")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    mod defaults_tests {
        use super::*;

        #[test]
        fn test_defaults() {
            let config = ProbeConfig::default();
            assert_eq!(config.storybook.url, "http://localhost:6006");
            assert_eq!(config.storybook.timeout_ms, 10_000);
            assert_eq!(config.browser.engine, BrowserEngine::Chromium);
            assert!(config.browser.headless);
            assert_eq!(config.browser.viewport, Viewport::default());
            assert!((config.visual.threshold - 0.2).abs() < f64::EPSILON);
            assert_eq!(config.paths.screenshots_dir, PathBuf::from("screenshots"));
            assert!(config.validate().is_ok());
        }

        #[test]
        fn test_builder() {
            let config = ProbeConfig::new()
                .with_url("http://sb.local:9009/")
                .with_timeout_ms(500)
                .with_viewport(800, 600)
                .with_threshold(0.05);
            assert_eq!(config.base_url(), "http://sb.local:9009");
            assert_eq!(config.timeout().as_millis(), 500);
            assert_eq!(config.browser.viewport.width, 800);
        }

        #[test]
        fn test_engine_fallback() {
            assert_eq!(BrowserEngine::Chromium.fallback(), BrowserEngine::Firefox);
            assert_eq!(BrowserEngine::parse("Chrome").unwrap(), BrowserEngine::Chromium);
            assert!(BrowserEngine::parse("webkit").is_err());
        }
    }

    mod yaml_tests {
        use super::*;

        #[test]
        fn test_partial_yaml_keeps_defaults() {
            let config = ProbeConfig::from_yaml_str(
                "storybook:\n  url: http://ci:6006\nbrowser:\n  engine: firefox\n  headless: false\n",
            )
            .unwrap();
            assert_eq!(config.storybook.url, "http://ci:6006");
            assert_eq!(config.storybook.timeout_ms, DEFAULT_TIMEOUT_MS);
            assert_eq!(config.browser.engine, BrowserEngine::Firefox);
            assert!(!config.browser.headless);
            assert_eq!(config.browser.viewport.height, 1080);
        }

        #[test]
        fn test_empty_yaml_is_default() {
            assert_eq!(ProbeConfig::from_yaml_str("  \n").unwrap(), ProbeConfig::default());
        }

        #[test]
        fn test_file_resolves_relative_dirs() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join(CONFIG_FILE_NAME);
            std::fs::write(&path, "paths:\n  screenshots_dir: shots\n  snapshots_dir: /abs/snaps\n")
                .unwrap();
            let config = ProbeConfig::from_file(&path).unwrap();
            assert_eq!(config.paths.screenshots_dir, dir.path().join("shots"));
            assert_eq!(config.paths.snapshots_dir, PathBuf::from("/abs/snaps"));
        }

        #[test]
        fn test_invalid_yaml() {
            let err = ProbeConfig::from_yaml_str("visual: [1, 2").unwrap_err();
            assert!(matches!(err, ProbeError::Yaml(_)));
        }
    }

    mod env_tests {
        use super::*;

        #[test]
        fn test_env_overrides() {
            let mut config = ProbeConfig::default();
            config
                .apply_env(env(&[
                    ("STORYBOOK_URL", "http://env:6006"),
                    ("STORYBOOK_TIMEOUT", "2500"),
                    ("BROWSER", "firefox"),
                    ("HEADLESS", "no"),
                    ("VIEWPORT_WIDTH", "1280"),
                    ("VISUAL_THRESHOLD", "0.01"),
                    ("SCREENSHOT_MODE", "viewport"),
                    ("UPDATE_BASELINES", "YES"),
                ]))
                .unwrap();
            assert_eq!(config.storybook.url, "http://env:6006");
            assert_eq!(config.storybook.timeout_ms, 2500);
            assert_eq!(config.browser.engine, BrowserEngine::Firefox);
            assert!(!config.browser.headless);
            assert_eq!(config.browser.viewport.width, 1280);
            assert_eq!(config.browser.viewport.height, 1080);
            assert_eq!(config.visual.screenshot_mode, ScreenshotMode::Viewport);
            assert!(config.visual.update_baselines);
        }

        #[test]
        fn test_env_bad_number() {
            let mut config = ProbeConfig::default();
            let err = config
                .apply_env(env(&[("STORYBOOK_TIMEOUT", "soon")]))
                .unwrap_err();
            assert!(err.to_string().contains("STORYBOOK_TIMEOUT"));
        }
    }

    mod validate_tests {
        use super::*;

        #[test]
        fn test_threshold_out_of_range() {
            assert!(ProbeConfig::new().with_threshold(1.5).validate().is_err());
            assert!(ProbeConfig::new().with_threshold(-0.1).validate().is_err());
            assert!(ProbeConfig::new().with_threshold(1.0).validate().is_ok());
        }

        #[test]
        fn test_zero_timeout_and_viewport() {
            assert!(ProbeConfig::new().with_timeout_ms(0).validate().is_err());
            assert!(ProbeConfig::new().with_viewport(0, 10).validate().is_err());
        }
    }
}
