//! Expected-property sheets.
//!
//! Components keep their expected computed styles in `.properties` files:
//!
//! ```text
//! # button.properties
//! border-radius=4px
//! primary.active.large.background-color=#1ea7fd
//! primary.active.large.color=var(--text-inverse)
//! ```
//!
//! and design tokens in a CSS variables file (`--name: value;` or
//! `--name=value`).

use std::collections::BTreeMap;
use std::path::Path;

use tracing::warn;

use crate::result::ProbeResult;

/// Keys with this prefix hold variable definitions, not expectations
const CSS_VAR_KEY_PREFIX: &str = "css-var.";

/// Expected CSS property values keyed by property name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertySheet {
    entries: BTreeMap<String, String>,
}

impl PropertySheet {
    /// Empty sheet
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `key=value` lines; blank lines and `#` comments are skipped
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let entries = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| line.split_once('='))
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .filter(|(k, _)| !k.is_empty())
            .collect();
        Self { entries }
    }

    /// Load a file
    pub fn load(path: impl AsRef<Path>) -> ProbeResult<Self> {
        Ok(Self::parse(&std::fs::read_to_string(path)?))
    }

    /// Add or replace an expectation
    #[must_use]
    pub fn with(mut self, property: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.insert(property.into(), value.into());
        self
    }

    /// Entries whose key starts with `prefix`, with the prefix removed
    #[must_use]
    pub fn with_prefix(&self, prefix: &str) -> Self {
        let entries = self
            .entries
            .iter()
            .filter_map(|(k, v)| {
                k.strip_prefix(prefix)
                    .filter(|rest| !rest.is_empty())
                    .map(|rest| (rest.to_string(), v.clone()))
            })
            .collect();
        Self { entries }
    }

    /// Entries for `<variant>.<state>.<size>.` (case-insensitive parts)
    #[must_use]
    pub fn for_variant(&self, variant: &str, state: &str, size: &str) -> Self {
        let prefix = format!(
            "{}.{}.{}.",
            variant.to_lowercase(),
            state.to_lowercase(),
            size.to_lowercase()
        );
        self.with_prefix(&prefix)
    }

    /// Plain expectations: everything except `css-var.` keys and `var(--…)` values
    pub fn literal(&self) -> impl Iterator<Item = (&str, &str)> {
        self.iter()
            .filter(|(k, v)| !k.starts_with(CSS_VAR_KEY_PREFIX) && variable_ref(v).is_none())
    }

    /// Expectations given as `var(--name)`, yielded as (property, `--name`)
    pub fn variable_refs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.iter()
            .filter(|(k, _)| !k.starts_with(CSS_VAR_KEY_PREFIX))
            .filter_map(|(k, v)| variable_ref(v).map(|name| (k, name)))
    }

    /// All entries
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Value for a key
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// No entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// `var(--name)` → `--name`
fn variable_ref(value: &str) -> Option<&str> {
    let inner = value.trim().strip_prefix("var(")?.strip_suffix(')')?.trim();
    // fallbacks such as `var(--a, red)` keep only the variable name
    let name = inner.split(',').next()?.trim();
    name.starts_with("--").then_some(name)
}

/// Design-token values keyed by `--name`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CssVariables {
    values: BTreeMap<String, String>,
}

impl CssVariables {
    /// Parse `--name: value;` or `--name=value` lines
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut values = BTreeMap::new();
        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let pair = line.split_once(':').or_else(|| line.split_once('='));
            if let Some((name, value)) = pair {
                let name = name.trim();
                let value = value.trim().trim_end_matches(';').trim();
                if name.starts_with("--") && !value.is_empty() {
                    values.insert(name.to_string(), value.to_string());
                }
            }
        }
        Self { values }
    }

    /// Load a file; an empty result is logged
    pub fn load(path: impl AsRef<Path>) -> ProbeResult<Self> {
        let path = path.as_ref();
        let vars = Self::parse(&std::fs::read_to_string(path)?);
        if vars.is_empty() {
            warn!(?path, "no CSS variables found");
        }
        Ok(vars)
    }

    /// Add or replace a variable
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Value of `--name`
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Variable names
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }

    /// All variables
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of variables
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// No variables
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const BUTTON: &str = "\
# button defaults
border-radius = 4px
cursor=pointer
css-var.--unused=1px

primary.active.large.background-color=#1ea7fd
primary.active.large.color=var(--text-inverse)
secondary.active.large.background-color=transparent
not a pair
";

    mod sheet_tests {
        use super::*;

        #[test]
        fn test_parse_skips_comments_and_junk() {
            let sheet = PropertySheet::parse(BUTTON);
            assert_eq!(sheet.get("border-radius"), Some("4px"));
            assert_eq!(sheet.get("cursor"), Some("pointer"));
            assert_eq!(sheet.len(), 6);
        }

        #[test]
        fn test_for_variant() {
            let sheet = PropertySheet::parse(BUTTON).for_variant("Primary", "ACTIVE", "large");
            assert_eq!(sheet.len(), 2);
            assert_eq!(sheet.get("background-color"), Some("#1ea7fd"));
        }

        #[test]
        fn test_literal_and_variable_split() {
            let sheet = PropertySheet::parse(BUTTON).for_variant("primary", "active", "large");
            let literal: Vec<_> = sheet.literal().collect();
            assert_eq!(literal, vec![("background-color", "#1ea7fd")]);
            let refs: Vec<_> = sheet.variable_refs().collect();
            assert_eq!(refs, vec![("color", "--text-inverse")]);

            let all = PropertySheet::parse(BUTTON);
            assert!(all.literal().all(|(k, _)| !k.starts_with("css-var.")));
        }

        #[test]
        fn test_load_file() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("button.properties");
            std::fs::write(&path, BUTTON).unwrap();
            assert_eq!(PropertySheet::load(&path).unwrap(), PropertySheet::parse(BUTTON));
            assert!(PropertySheet::load(dir.path().join("missing.properties")).is_err());
        }

        #[test]
        fn test_variable_ref_with_fallback() {
            assert_eq!(variable_ref("var(--a, red)"), Some("--a"));
            assert_eq!(variable_ref("var(a)"), None);
            assert_eq!(variable_ref("red"), None);
        }
    }

    mod css_variable_tests {
        use super::*;

        #[test]
        fn test_both_syntaxes() {
            let vars = CssVariables::parse(
                "--primary: #1ea7fd;\n--radius=4px\n# --ignored: 1\ncolor: red;\n--empty: ;\n",
            );
            assert_eq!(vars.get("--primary"), Some("#1ea7fd"));
            assert_eq!(vars.get("--radius"), Some("4px"));
            assert_eq!(vars.len(), 2);
            assert_eq!(vars.names(), vec!["--primary", "--radius"]);
        }
    }
}
