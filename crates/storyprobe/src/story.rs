//! Story identifiers and Storybook URLs.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::controls::ControlValue;
use crate::result::{ProbeError, ProbeResult};

/// Panel id that opens the controls addon in the manager UI
pub const CONTROLS_PANEL: &str = "storybook/controls/panel";

/// A story identifier such as `example-button--primary`.
///
/// Both halves are kebab case (`[a-z0-9-]`, starting with a letter or digit)
/// joined by `--`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StoryId(String);

impl StoryId {
    /// Validate and wrap an identifier
    pub fn new(id: impl Into<String>) -> ProbeResult<Self> {
        let id = id.into();
        let invalid = || ProbeError::InvalidStoryId { id: id.clone() };
        let (component, variant) = id.split_once("--").ok_or_else(invalid)?;
        if !is_kebab(component) || !is_kebab(variant) {
            return Err(invalid());
        }
        Ok(Self(id))
    }

    /// Full identifier
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Component half (`example-button`)
    #[must_use]
    pub fn component(&self) -> &str {
        self.0.split_once("--").map_or(self.0.as_str(), |(c, _)| c)
    }

    /// Variant half (`primary`)
    #[must_use]
    pub fn variant(&self) -> &str {
        self.0.split_once("--").map_or("", |(_, v)| v)
    }

    /// Relative directory for this story's baselines (`example-button/primary`).
    /// Only the first `--` becomes a separator.
    #[must_use]
    pub fn baseline_dir(&self) -> PathBuf {
        PathBuf::from(self.component()).join(self.variant())
    }
}

fn is_kebab(part: &str) -> bool {
    part.chars()
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        && part
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

impl fmt::Display for StoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for StoryId {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for StoryId {
    type Error = ProbeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for StoryId {
    type Error = ProbeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<StoryId> for String {
    fn from(id: StoryId) -> Self {
        id.0
    }
}

/// Which Storybook page renders the story
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    /// Bare preview iframe (`iframe.html`), the story is the top document
    #[default]
    Iframe,
    /// Manager UI with sidebar and addon panels, the story is in a child iframe
    Full,
}

/// Extra URL state applied when opening a story
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NavigateOptions {
    /// Initial story args
    pub args: BTreeMap<String, ControlValue>,
    /// Storybook globals (`themeMode`, `locale`, ...)
    pub globals: BTreeMap<String, String>,
    /// Element that must exist before navigation counts as done
    pub wait_for_selector: Option<String>,
    /// Open the controls panel (manager UI only)
    pub controls_panel: bool,
}

impl NavigateOptions {
    /// Empty options
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an initial arg
    #[must_use]
    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<ControlValue>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }

    /// Add a global
    #[must_use]
    pub fn with_global(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.globals.insert(key.into(), value.into());
        self
    }

    /// Shorthand for the `themeMode` global
    #[must_use]
    pub fn with_theme(self, mode: impl Into<String>) -> Self {
        self.with_global("themeMode", mode)
    }

    /// Wait for an element after loading
    #[must_use]
    pub fn wait_for(mut self, selector: impl Into<String>) -> Self {
        self.wait_for_selector = Some(selector.into());
        self
    }

    /// Open the controls panel
    #[must_use]
    pub const fn with_controls_panel(mut self) -> Self {
        self.controls_panel = true;
        self
    }
}

/// Build the URL that renders `id` in `mode`
#[must_use]
pub fn story_url(base: &str, id: &StoryId, mode: ViewMode, options: &NavigateOptions) -> String {
    let base = base.trim_end_matches('/');
    let mut url = match mode {
        ViewMode::Iframe => format!("{base}/iframe.html?id={id}&viewMode=story"),
        ViewMode::Full => format!("{base}/?path=/story/{id}"),
    };
    let args = args_query(&options.args);
    if !args.is_empty() {
        url.push_str("&args=");
        url.push_str(&args);
    }
    let globals = globals_query(&options.globals);
    if !globals.is_empty() {
        url.push_str("&globals=");
        url.push_str(&globals);
    }
    if options.controls_panel && mode == ViewMode::Full {
        url.push_str("&addonPanel=");
        url.push_str(CONTROLS_PANEL);
    }
    url
}

/// Encode args in Storybook's URL syntax: `key:value;key2:!true`.
///
/// Booleans and null use the `!` prefix, strings are form encoded (spaces
/// become `+`), numbers are written verbatim and lists or maps are sent as
/// percent-encoded canonical JSON.
#[must_use]
pub fn args_query(args: &BTreeMap<String, ControlValue>) -> String {
    args.iter()
        .map(|(key, value)| format!("{key}:{}", encode_arg(value)))
        .collect::<Vec<_>>()
        .join(";")
}

fn encode_arg(value: &ControlValue) -> String {
    match value {
        ControlValue::Null => "!null".to_string(),
        ControlValue::Boolean(true) => "!true".to_string(),
        ControlValue::Boolean(false) => "!false".to_string(),
        ControlValue::Number(n) => n.to_string(),
        ControlValue::Text(s) => url::form_urlencoded::byte_serialize(s.as_bytes()).collect(),
        ControlValue::List(_) | ControlValue::Map(_) => {
            url::form_urlencoded::byte_serialize(value.to_canonical_json().as_bytes()).collect()
        }
    }
}

/// Encode globals as `key:value;key2:value2`
#[must_use]
pub fn globals_query(globals: &BTreeMap<String, String>) -> String {
    globals
        .iter()
        .map(|(k, v)| {
            let v: String = url::form_urlencoded::byte_serialize(v.as_bytes()).collect();
            format!("{k}:{v}")
        })
        .collect::<Vec<_>>()
        .join(";")
}
