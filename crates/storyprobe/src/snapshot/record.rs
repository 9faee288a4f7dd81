//! Structural records and their diff.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// One element of a captured DOM subtree
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StructuralRecord {
    /// Lowercase tag name
    pub tag: String,
    /// Attributes that survived the filter
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Own text, whitespace collapsed
    #[serde(default)]
    pub text: String,
    /// Allow-listed computed styles, when captured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub styles: Option<BTreeMap<String, String>>,
    /// Element children in document order
    #[serde(default)]
    pub children: Vec<StructuralRecord>,
}

impl StructuralRecord {
    /// Bare element
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    /// Add an attribute
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Set the text
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Add a style
    #[must_use]
    pub fn with_style(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.styles
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value.into());
        self
    }

    /// Append a child
    #[must_use]
    pub fn with_child(mut self, child: Self) -> Self {
        self.children.push(child);
        self
    }

    /// Elements in this subtree, self included
    #[must_use]
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(Self::node_count).sum::<usize>()
    }

    /// Every difference between `self` (baseline) and `current`
    #[must_use]
    pub fn diff(&self, current: &Self) -> Vec<DiffEntry> {
        let mut out = Vec::new();
        diff_node(self, current, &self.tag, &mut out);
        out
    }
}

/// How a path differs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffKind {
    /// Present on both sides with different values
    Changed,
    /// Only in the current capture
    Added,
    /// Only in the baseline
    Removed,
}

/// One differing path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffEntry {
    /// Location, e.g. `div/button[0]@class` or `div/span[1]/text()`
    pub path: String,
    /// Kind of difference
    pub kind: DiffKind,
    /// Baseline value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline: Option<String>,
    /// Current value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<String>,
}

impl DiffEntry {
    fn changed(path: String, baseline: impl Into<String>, current: impl Into<String>) -> Self {
        Self {
            path,
            kind: DiffKind::Changed,
            baseline: Some(baseline.into()),
            current: Some(current.into()),
        }
    }

    fn between(path: String, baseline: Option<&String>, current: Option<&String>) -> Option<Self> {
        let kind = match (baseline, current) {
            (Some(b), Some(c)) if b == c => return None,
            (Some(_), Some(_)) => DiffKind::Changed,
            (None, Some(_)) => DiffKind::Added,
            (Some(_), None) => DiffKind::Removed,
            (None, None) => return None,
        };
        Some(Self {
            path,
            kind,
            baseline: baseline.cloned(),
            current: current.cloned(),
        })
    }
}

impl fmt::Display for DiffEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |v: &Option<String>| v.as_deref().map_or_else(|| "-".to_string(), |s| format!("{s:?}"));
        match self.kind {
            DiffKind::Changed => write!(
                f,
                "{} changed: {} -> {}",
                self.path,
                show(&self.baseline),
                show(&self.current)
            ),
            DiffKind::Added => write!(f, "{} added: {}", self.path, show(&self.current)),
            DiffKind::Removed => write!(f, "{} removed: {}", self.path, show(&self.baseline)),
        }
    }
}

fn diff_maps(
    base: &BTreeMap<String, String>,
    current: &BTreeMap<String, String>,
    path: impl Fn(&str) -> String,
    out: &mut Vec<DiffEntry>,
) {
    let keys: BTreeSet<&String> = base.keys().chain(current.keys()).collect();
    out.extend(
        keys.into_iter()
            .filter_map(|k| DiffEntry::between(path(k), base.get(k), current.get(k))),
    );
}

fn diff_node(base: &StructuralRecord, current: &StructuralRecord, path: &str, out: &mut Vec<DiffEntry>) {
    if base.tag != current.tag {
        out.push(DiffEntry::changed(path.to_string(), &base.tag, &current.tag));
    }
    diff_maps(&base.attributes, &current.attributes, |k| format!("{path}@{k}"), out);
    if base.text != current.text {
        out.push(DiffEntry::changed(format!("{path}/text()"), &base.text, &current.text));
    }
    // styles are compared only when both captures recorded them
    if let (Some(base_styles), Some(styles)) = (&base.styles, &current.styles) {
        diff_maps(base_styles, styles, |k| format!("{path}::style({k})"), out);
    }

    let (b, c) = (base.children.len(), current.children.len());
    if b != c {
        out.push(DiffEntry::changed(format!("{path}/*"), b.to_string(), c.to_string()));
    }
    for i in 0..b.max(c) {
        match (base.children.get(i), current.children.get(i)) {
            (Some(bc), Some(cc)) => {
                let child_path = format!("{path}/{}[{i}]", cc.tag);
                diff_node(bc, cc, &child_path, out);
            }
            (Some(bc), None) => out.push(DiffEntry {
                path: format!("{path}/{}[{i}]", bc.tag),
                kind: DiffKind::Removed,
                baseline: Some(bc.tag.clone()),
                current: None,
            }),
            (None, Some(cc)) => out.push(DiffEntry {
                path: format!("{path}/{}[{i}]", cc.tag),
                kind: DiffKind::Added,
                baseline: None,
                current: Some(cc.tag.clone()),
            }),
            (None, None) => {}
        }
    }
}
