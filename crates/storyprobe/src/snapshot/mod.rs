//! Structural snapshots.
//!
//! A structural snapshot is the story's rendered subtree reduced to
//! `{tag, attributes, text, styles?, children}` and stored as JSON. Volatile
//! attributes are filtered out at capture time so that two renders of the same
//! story produce equal records.

mod record;

pub use record::{DiffEntry, DiffKind, StructuralRecord};

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::baseline::{BaselineKind, BaselineStore, Verdict};
use crate::result::{ProbeError, ProbeResult};
use crate::script::{self, Script};
use crate::story::StoryId;
use crate::target::RenderTargetClient;

/// Computed styles captured when styles are requested
pub const STYLE_ALLOW_LIST: [&str; 12] = [
    "display",
    "visibility",
    "opacity",
    "width",
    "height",
    "background-color",
    "color",
    "font-size",
    "font-weight",
    "margin",
    "padding",
    "border",
];

/// Mount points tried in order
pub const DEFAULT_ROOT_SELECTORS: [&str; 2] = ["#storybook-root", "#root"];

/// Attributes dropped by name
pub const DEFAULT_EXCLUDED_ATTRIBUTES: [&str; 3] = ["data-timestamp", "nonce", "data-reactroot"];

/// Attributes holding generated element ids
pub const ID_LIKE_ATTRIBUTES: [&str; 6] = [
    "id",
    "for",
    "aria-labelledby",
    "aria-describedby",
    "aria-controls",
    "aria-owns",
];

/// Generated id values: React `useId` (`:r1:`), Radix (`radix-:r2:`),
/// Headless UI (`headlessui-menu-button-3`)
pub const DEFAULT_VOLATILE_PATTERNS: [&str; 3] = [
    r":r[0-9a-z]+:",
    r"^radix-",
    r"^headlessui-[a-z-]+-\d+",
];

// =============================================================================
// Attribute filter
// =============================================================================

/// Decides which attributes make it into a record
#[derive(Debug, Clone)]
pub struct AttributeFilter {
    excluded: BTreeSet<String>,
    id_like: BTreeSet<String>,
    patterns: Vec<Regex>,
}

impl Default for AttributeFilter {
    fn default() -> Self {
        Self {
            excluded: DEFAULT_EXCLUDED_ATTRIBUTES.iter().map(ToString::to_string).collect(),
            id_like: ID_LIKE_ATTRIBUTES.iter().map(ToString::to_string).collect(),
            patterns: DEFAULT_VOLATILE_PATTERNS
                .iter()
                .filter_map(|p| Regex::new(p).ok())
                .collect(),
        }
    }
}

impl AttributeFilter {
    /// Default exclusions
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Also drop attributes named `name`
    #[must_use]
    pub fn exclude(mut self, name: impl Into<String>) -> Self {
        self.excluded.insert(name.into().to_ascii_lowercase());
        self
    }

    /// Also treat id-like values matching `pattern` as volatile
    ///
    /// # Errors
    ///
    /// Returns error if the pattern is not a valid regex
    pub fn with_pattern(mut self, pattern: &str) -> ProbeResult<Self> {
        let re = Regex::new(pattern)
            .map_err(|e| ProbeError::config(format!("invalid attribute pattern `{pattern}`: {e}")))?;
        self.patterns.push(re);
        Ok(self)
    }

    /// Check `pattern` values on another attribute too
    #[must_use]
    pub fn id_like(mut self, name: impl Into<String>) -> Self {
        self.id_like.insert(name.into().to_ascii_lowercase());
        self
    }

    /// Should the attribute be recorded
    #[must_use]
    pub fn keep(&self, name: &str, value: &str) -> bool {
        let name = name.to_ascii_lowercase();
        if self.excluded.contains(&name) {
            return false;
        }
        !(self.id_like.contains(&name) && self.patterns.iter().any(|re| re.is_match(value)))
    }
}

// =============================================================================
// Capture options
// =============================================================================

/// What a capture records
#[derive(Debug, Clone)]
pub struct CaptureOptions {
    /// Walk the whole subtree with attributes; otherwise only the mount point
    /// and its full text
    pub include_html: bool,
    /// Record [`STYLE_ALLOW_LIST`] computed styles
    pub include_styles: bool,
    /// Mount-point selectors, first match wins
    pub root_selectors: Vec<String>,
    /// Attribute filter
    pub filter: AttributeFilter,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            include_html: true,
            include_styles: false,
            root_selectors: DEFAULT_ROOT_SELECTORS.iter().map(ToString::to_string).collect(),
            filter: AttributeFilter::default(),
        }
    }
}

impl CaptureOptions {
    /// HTML without styles
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle subtree capture
    #[must_use]
    pub const fn with_html(mut self, include: bool) -> Self {
        self.include_html = include;
        self
    }

    /// Toggle style capture
    #[must_use]
    pub const fn with_styles(mut self, include: bool) -> Self {
        self.include_styles = include;
        self
    }

    /// Capture from `selector` instead of the default mount points
    #[must_use]
    pub fn with_root(mut self, selector: impl Into<String>) -> Self {
        self.root_selectors = vec![selector.into()];
        self
    }

    /// Replace the attribute filter
    #[must_use]
    pub fn with_filter(mut self, filter: AttributeFilter) -> Self {
        self.filter = filter;
        self
    }
}

/// Raw node as answered by the capture script
#[derive(Debug, Deserialize)]
struct RawNode {
    tag: String,
    #[serde(default)]
    attributes: BTreeMap<String, String>,
    #[serde(default)]
    text: String,
    #[serde(default)]
    styles: Option<BTreeMap<String, String>>,
    #[serde(default)]
    children: Vec<RawNode>,
}

/// Collapse runs of whitespace and trim
#[must_use]
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl RawNode {
    fn into_record(self, filter: &AttributeFilter) -> StructuralRecord {
        StructuralRecord {
            tag: self.tag.to_ascii_lowercase(),
            attributes: self
                .attributes
                .into_iter()
                .filter(|(k, v)| filter.keep(k, v))
                .collect(),
            text: normalize_text(&self.text),
            styles: self.styles.map(|styles| {
                styles
                    .into_iter()
                    .map(|(k, v)| (k, v.trim().to_string()))
                    .collect()
            }),
            children: self
                .children
                .into_iter()
                .map(|child| child.into_record(filter))
                .collect(),
        }
    }
}

// =============================================================================
// Engine
// =============================================================================

/// Outcome of a structural comparison
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotDiff {
    /// Story
    pub story: StoryId,
    /// Snapshot name
    pub name: String,
    /// Verdict
    pub verdict: Verdict,
    /// Differences, empty unless the verdict is a failure
    pub entries: Vec<DiffEntry>,
    /// Baseline file
    pub baseline_path: PathBuf,
}

impl SnapshotDiff {
    /// Differing paths
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.path.clone()).collect()
    }

    /// Anything but a failure
    #[must_use]
    pub const fn passed(&self) -> bool {
        self.verdict.is_success()
    }

    /// Turn a failed verdict into [`ProbeError::StructuralDifference`]
    pub fn assert_passed(&self) -> ProbeResult<()> {
        if self.passed() {
            Ok(())
        } else {
            Err(ProbeError::StructuralDifference {
                name: self.name.clone(),
                paths: self.paths(),
            })
        }
    }
}

/// Captures and compares structural records
#[derive(Debug, Clone)]
pub struct StructuralSnapshotEngine {
    client: RenderTargetClient,
    store: BaselineStore,
}

impl StructuralSnapshotEngine {
    /// Engine using the client's configured snapshot directory
    #[must_use]
    pub fn new(client: RenderTargetClient) -> Self {
        let store = BaselineStore::from_config(client.config());
        Self { client, store }
    }

    /// Use another store
    #[must_use]
    pub fn with_store(mut self, store: BaselineStore) -> Self {
        self.store = store;
        self
    }

    /// Baseline store in use
    #[must_use]
    pub const fn store(&self) -> &BaselineStore {
        &self.store
    }

    /// Capture the story's subtree
    pub async fn capture_snapshot(
        &self,
        id: &StoryId,
        options: &CaptureOptions,
    ) -> ProbeResult<StructuralRecord> {
        self.client.ensure_loaded(id).await?;
        let styles: &[&str] = if options.include_styles {
            &STYLE_ALLOW_LIST
        } else {
            &[]
        };
        let request = Script::capture_structure(&options.root_selectors, options.include_html, styles);
        let answer = self.client.evaluate(&request).await?;
        let Some(mut map) = script::found(answer) else {
            let selector = options.root_selectors.join(", ");
            warn!(story = %id, %selector, "story mount point not found");
            return Err(ProbeError::SelectorNotFound { selector });
        };
        let raw: RawNode = serde_json::from_value(map.remove("root").unwrap_or(Value::Null))
            .map_err(|e| ProbeError::script(request.kind.name(), e.to_string()))?;
        let mut record = raw.into_record(&options.filter);
        if !options.include_html {
            record.attributes.clear();
            record.children.clear();
        }
        debug!(story = %id, nodes = record.node_count(), "structure captured");
        Ok(record)
    }

    /// Capture and compare without failing; a missing baseline is created
    pub async fn compare_snapshot(
        &self,
        id: &StoryId,
        name: &str,
        options: &CaptureOptions,
    ) -> ProbeResult<SnapshotDiff> {
        self.run(id, name, options, false).await
    }

    /// Capture and compare. `update` overwrites the baseline and succeeds;
    /// otherwise a mismatch is [`ProbeError::StructuralDifference`].
    pub async fn assert_snapshot(
        &self,
        id: &StoryId,
        name: &str,
        include_html: bool,
        include_styles: bool,
        update: bool,
    ) -> ProbeResult<SnapshotDiff> {
        let options = CaptureOptions::new()
            .with_html(include_html)
            .with_styles(include_styles);
        let update = update || self.client.config().visual.update_baselines;
        let diff = self.run(id, name, &options, update).await?;
        diff.assert_passed()?;
        Ok(diff)
    }

    async fn run(
        &self,
        id: &StoryId,
        name: &str,
        options: &CaptureOptions,
        update: bool,
    ) -> ProbeResult<SnapshotDiff> {
        let path = self.store.path(BaselineKind::Structural, id, name)?;
        let current = self.capture_snapshot(id, options).await?;
        let exists = path.is_file();

        let (verdict, entries) = if update || !exists {
            save_snapshot(&path, &current, true)?;
            let verdict = if exists {
                Verdict::BaselineUpdated
            } else {
                Verdict::BaselineCreated
            };
            warn!(story = %id, name, ?path, %verdict, "structural baseline written");
            (verdict, Vec::new())
        } else {
            let entries = load_snapshot(&path)?.diff(&current);
            if entries.is_empty() {
                info!(story = %id, name, "snapshot matches baseline");
                (Verdict::Pass, entries)
            } else {
                warn!(story = %id, name, differences = entries.len(), "snapshot differs from baseline");
                for entry in &entries {
                    debug!(%entry, "difference");
                }
                (Verdict::Fail, entries)
            }
        };

        Ok(SnapshotDiff {
            story: id.clone(),
            name: name.to_string(),
            verdict,
            entries,
            baseline_path: path,
        })
    }
}

/// Write a record as pretty JSON
///
/// # Errors
///
/// Returns [`ProbeError::BaselineExists`] if the file exists and `overwrite`
/// is false
pub fn save_snapshot(path: &Path, record: &StructuralRecord, overwrite: bool) -> ProbeResult<()> {
    if path.exists() && !overwrite {
        return Err(ProbeError::BaselineExists {
            path: path.to_path_buf(),
        });
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut json = serde_json::to_string_pretty(record)?;
    json.push('\n');
    std::fs::write(path, json)?;
    Ok(())
}

/// Read a record
///
/// # Errors
///
/// Returns [`ProbeError::BaselineNotFound`] if the file is missing
pub fn load_snapshot(path: &Path) -> ProbeResult<StructuralRecord> {
    if !path.is_file() {
        return Err(ProbeError::BaselineNotFound {
            path: path.to_path_buf(),
        });
    }
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}
