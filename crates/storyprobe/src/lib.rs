//! Storyprobe: browser-driven testing for Storybook components
//!
//! Storyprobe opens stories of a running Storybook in a real browser and
//! checks them from four angles: prop values (controls), computed CSS,
//! screenshots against PNG baselines, and DOM structure against JSON
//! baselines.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                   STORYPROBE Architecture                       │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────┐ ┌─────────────────┐                        │
//! │  │ Control         │ │ Property        │                        │
//! │  │ Synchronizer    │ │ Inspector       │                        │
//! │  └────────┬────────┘ └────────┬────────┘                        │
//! │  ┌────────┴────────┐ ┌────────┴────────┐   ┌────────────────┐   │
//! │  │ VisualDiff      │ │ Structural      │──►│ BaselineStore  │   │
//! │  │ Engine          │─┼─SnapshotEngine  │   │ (png / json)   │   │
//! │  └────────┬────────┘ └────────┬────────┘   └────────────────┘   │
//! │           ▼                   ▼                                 │
//! │  ┌─────────────────────────────────────┐   ┌────────────────┐   │
//! │  │ RenderTargetClient                  │──►│ PageDriver     │   │
//! │  │ story URLs, readiness, timeouts     │   │ CDP / mock     │   │
//! │  └─────────────────────────────────────┘   └────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use storyprobe::prelude::*;
//!
//! # async fn demo(client: RenderTargetClient) -> ProbeResult<()> {
//! let story = StoryId::new("example-button--primary")?;
//! client.navigate(&story, ViewMode::Iframe).await?;
//!
//! let controls = ControlSynchronizer::new(client.clone());
//! controls.set_control(&story, "label", "Updated Button").await?;
//!
//! let inspector = PropertyInspector::new(client.clone());
//! inspector.verify_component_text("button", "Updated Button", true).await?;
//! inspector.verify_color("button", "#1ea7fd", ColorKind::Background).await?;
//!
//! let visual = VisualDiffEngine::new(client.clone());
//! visual.compare_screenshot(&story, "updated", None).await?.assert_passed()?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::float_cmp))]

/// Baseline files on disk
pub mod baseline;
/// Configuration: defaults, YAML file, environment
pub mod config;
/// Story args: strategies and values
#[allow(clippy::missing_errors_doc)]
pub mod controls;
/// Browser page abstraction
#[allow(clippy::missing_errors_doc)]
pub mod driver;
/// Computed styles, colors, dimensions and text
#[allow(clippy::missing_errors_doc, clippy::doc_markdown)]
pub mod inspect;
/// Tracing subscriber setup
pub mod logging;
/// Error types
pub mod result;
/// In-page script templates
pub mod script;
/// Structural snapshots
#[allow(clippy::missing_errors_doc)]
pub mod snapshot;
/// Story identifiers and URLs
pub mod story;
/// Browser page handle
#[allow(clippy::missing_errors_doc)]
pub mod target;
/// Visual regression
#[allow(clippy::missing_errors_doc, clippy::cast_precision_loss)]
pub mod visual;

pub use baseline::{BaselineEntry, BaselineKind, BaselineStore, Verdict};
pub use config::{BrowserEngine, ProbeConfig, ScreenshotMode, Viewport};
pub use controls::{ApiStrategy, ArgMap, ControlSynchronizer, ControlValue, SyncStrategy, UiStrategy};
#[cfg(feature = "browser")]
pub use driver::ChromiumDriver;
pub use driver::{ClipRect, MockDriver, PageDriver, ScreenshotScope};
pub use inspect::{
    ColorKind, CssVariables, Dimensions, PropertyExpectation, PropertyInspector, PropertySheet, Rgba,
};
pub use logging::{init_logging, LogFormat};
pub use result::{ProbeError, ProbeResult};
pub use snapshot::{
    load_snapshot, save_snapshot, AttributeFilter, CaptureOptions, DiffEntry, SnapshotDiff,
    StructuralRecord, StructuralSnapshotEngine,
};
pub use story::{NavigateOptions, StoryId, ViewMode};
pub use target::RenderTargetClient;
pub use visual::{CaptureTarget, ImageComparator, MaskRegion, VisualDiff, VisualDiffEngine, VisualOptions};

/// Everything a test usually needs
pub mod prelude {
    pub use super::baseline::{BaselineKind, BaselineStore, Verdict};
    pub use super::config::ProbeConfig;
    pub use super::controls::{ControlSynchronizer, ControlValue};
    pub use super::driver::MockDriver;
    pub use super::inspect::{ColorKind, PropertyExpectation, PropertyInspector, Rgba};
    pub use super::result::{ProbeError, ProbeResult};
    pub use super::snapshot::{CaptureOptions, StructuralRecord, StructuralSnapshotEngine};
    pub use super::story::{NavigateOptions, StoryId, ViewMode};
    pub use super::target::RenderTargetClient;
    pub use super::visual::{VisualDiffEngine, VisualOptions};
}
