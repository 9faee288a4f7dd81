//! On-disk baseline store.
//!
//! Layout:
//!
//! ```text
//! {screenshots_dir}/{component}/{variant}/{name}.png
//! {screenshots_dir}/__diffs__/{component}/{variant}/{name}.diff.png
//! {screenshots_dir}/__captures__/{component}/{variant}/{name}.png
//! {snapshots_dir}/{component}/{variant}/{name}.json
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ProbeConfig;
use crate::result::{ProbeError, ProbeResult};
use crate::story::StoryId;

/// Directory holding diff artifacts of failed comparisons
pub const DIFF_DIR_NAME: &str = "__diffs__";

/// Directory holding plain captures from `take_screenshot`
pub const CAPTURE_DIR_NAME: &str = "__captures__";

/// Outcome of comparing against a stored baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Matches the baseline
    Pass,
    /// Differs from the baseline
    Fail,
    /// No baseline existed; the capture became the baseline
    BaselineCreated,
    /// Baseline overwritten on request
    BaselineUpdated,
}

impl Verdict {
    /// Everything but [`Verdict::Fail`]
    #[must_use]
    pub const fn is_success(self) -> bool {
        !matches!(self, Self::Fail)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::BaselineCreated => "baseline created",
            Self::BaselineUpdated => "baseline updated",
        })
    }
}

/// Kind of stored baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaselineKind {
    /// PNG screenshot
    Visual,
    /// JSON structural record
    Structural,
}

impl BaselineKind {
    /// File extension without the dot
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Visual => "png",
            Self::Structural => "json",
        }
    }

    /// Both kinds
    pub const ALL: [Self; 2] = [Self::Visual, Self::Structural];
}

impl fmt::Display for BaselineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Visual => "visual",
            Self::Structural => "structural",
        })
    }
}

impl FromStr for BaselineKind {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "visual" | "screenshot" | "png" => Ok(Self::Visual),
            "structural" | "snapshot" | "json" => Ok(Self::Structural),
            other => Err(ProbeError::config(format!("unknown baseline kind `{other}`"))),
        }
    }
}

/// A stored baseline found by [`BaselineStore::list`]
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct BaselineEntry {
    /// Kind
    pub kind: BaselineKind,
    /// Story the baseline belongs to
    pub story: StoryId,
    /// Baseline name
    pub name: String,
    /// File path
    pub path: PathBuf,
}

/// Reject names that would escape the story directory
pub fn validate_name(name: &str) -> ProbeResult<()> {
    let bad = name.trim().is_empty()
        || name == "."
        || name.contains("..")
        || name.contains(['/', '\\', '\0']);
    if bad {
        Err(ProbeError::InvalidBaselineName {
            name: name.to_string(),
        })
    } else {
        Ok(())
    }
}

/// Filesystem store for visual and structural baselines
///
/// A story's files live under `{component}/{variant}/`, split at the first
/// `--` only. `a--b--c` is stored under `a/b--c/`, which keeps the layout two
/// levels deep so [`BaselineStore::list`] can rebuild the id from the path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaselineStore {
    screenshots_dir: PathBuf,
    snapshots_dir: PathBuf,
}

impl BaselineStore {
    /// Store with explicit roots
    pub fn new(screenshots_dir: impl Into<PathBuf>, snapshots_dir: impl Into<PathBuf>) -> Self {
        Self {
            screenshots_dir: screenshots_dir.into(),
            snapshots_dir: snapshots_dir.into(),
        }
    }

    /// Store rooted at the configured directories
    #[must_use]
    pub fn from_config(config: &ProbeConfig) -> Self {
        Self::new(&config.paths.screenshots_dir, &config.paths.snapshots_dir)
    }

    /// Root directory for `kind`
    #[must_use]
    pub fn root(&self, kind: BaselineKind) -> &Path {
        match kind {
            BaselineKind::Visual => &self.screenshots_dir,
            BaselineKind::Structural => &self.snapshots_dir,
        }
    }

    /// Path of the baseline `(id, name)`
    pub fn path(&self, kind: BaselineKind, id: &StoryId, name: &str) -> ProbeResult<PathBuf> {
        validate_name(name)?;
        Ok(self
            .root(kind)
            .join(id.baseline_dir())
            .join(format!("{name}.{}", kind.extension())))
    }

    /// Path of a diff artifact, e.g. `suffix = "diff"` → `{name}.diff.png`
    pub fn diff_path(&self, id: &StoryId, name: &str, suffix: &str) -> ProbeResult<PathBuf> {
        validate_name(name)?;
        Ok(self
            .screenshots_dir
            .join(DIFF_DIR_NAME)
            .join(id.baseline_dir())
            .join(format!("{name}.{suffix}.png")))
    }

    /// Path of a plain capture
    pub fn capture_path(&self, id: &StoryId, name: &str) -> ProbeResult<PathBuf> {
        validate_name(name)?;
        Ok(self
            .screenshots_dir
            .join(CAPTURE_DIR_NAME)
            .join(id.baseline_dir())
            .join(format!("{name}.png")))
    }

    /// Does the baseline exist
    pub fn exists(&self, kind: BaselineKind, id: &StoryId, name: &str) -> ProbeResult<bool> {
        Ok(self.path(kind, id, name)?.is_file())
    }

    /// Baseline bytes
    pub fn read(&self, kind: BaselineKind, id: &StoryId, name: &str) -> ProbeResult<Vec<u8>> {
        let path = self.path(kind, id, name)?;
        if !path.is_file() {
            return Err(ProbeError::BaselineNotFound { path });
        }
        Ok(std::fs::read(path)?)
    }

    /// Write (or replace) a baseline, creating directories as needed
    pub fn write(
        &self,
        kind: BaselineKind,
        id: &StoryId,
        name: &str,
        bytes: &[u8],
    ) -> ProbeResult<PathBuf> {
        let path = self.path(kind, id, name)?;
        write_file(&path, bytes)?;
        Ok(path)
    }

    /// Write a diff artifact
    pub fn write_diff(
        &self,
        id: &StoryId,
        name: &str,
        suffix: &str,
        png: &[u8],
    ) -> ProbeResult<PathBuf> {
        let path = self.diff_path(id, name, suffix)?;
        write_file(&path, png)?;
        Ok(path)
    }

    /// Write a plain capture
    pub fn write_capture(&self, id: &StoryId, name: &str, png: &[u8]) -> ProbeResult<PathBuf> {
        let path = self.capture_path(id, name)?;
        write_file(&path, png)?;
        Ok(path)
    }

    /// Delete one baseline; `false` when there was none
    pub fn remove(&self, kind: BaselineKind, id: &StoryId, name: &str) -> ProbeResult<bool> {
        let path = self.path(kind, id, name)?;
        if !path.is_file() {
            return Ok(false);
        }
        std::fs::remove_file(&path)?;
        debug!(?path, "baseline removed");
        Ok(true)
    }

    /// Delete every baseline of a story; returns how many were removed
    pub fn remove_story(&self, kind: BaselineKind, id: &StoryId) -> ProbeResult<usize> {
        let entries: Vec<_> = self
            .list(kind)?
            .into_iter()
            .filter(|e| &e.story == id)
            .collect();
        for entry in &entries {
            std::fs::remove_file(&entry.path)?;
        }
        Ok(entries.len())
    }

    /// Every baseline of `kind`, sorted by story then name
    pub fn list(&self, kind: BaselineKind) -> ProbeResult<Vec<BaselineEntry>> {
        let root = self.root(kind);
        let mut entries = Vec::new();
        for component in subdirs(root)? {
            for variant in subdirs(&component)? {
                let story = format!("{}--{}", file_name(&component), file_name(&variant));
                let Ok(story) = StoryId::new(story) else {
                    continue;
                };
                for file in std::fs::read_dir(&variant)? {
                    let path = file?.path();
                    if path.extension().and_then(|e| e.to_str()) != Some(kind.extension()) {
                        continue;
                    }
                    let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                        continue;
                    };
                    entries.push(BaselineEntry {
                        kind,
                        story: story.clone(),
                        name: name.to_string(),
                        path: path.clone(),
                    });
                }
            }
        }
        entries.sort();
        Ok(entries)
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> ProbeResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)?;
    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Child directories, skipping artifact directories; empty when `dir` is missing
fn subdirs(dir: &Path) -> ProbeResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let name = file_name(&path);
        if path.is_dir() && name != DIFF_DIR_NAME && name != CAPTURE_DIR_NAME {
            dirs.push(path);
        }
    }
    Ok(dirs)
}
