//! Page driver abstraction.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  PageDriver (trait)                                          │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌──────────────────────┐        ┌────────────────────────┐  │
//! │  │  ChromiumDriver      │        │  MockDriver            │  │
//! │  │  CDP via             │        │  scripted answers per  │  │
//! │  │  chromiumoxide       │        │  ScriptKind, no browser│  │
//! │  │  (feature `browser`) │        │                        │  │
//! │  └──────────────────────┘        └────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! A driver owns one browser page. It knows nothing about Storybook; URL
//! building, readiness and timeouts live in [`crate::target`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::result::ProbeResult;
use crate::script::Script;

#[cfg(feature = "browser")]
mod cdp;
mod mock;

#[cfg(feature = "browser")]
pub use cdp::ChromiumDriver;
pub use mock::{MockDriver, NavigateHandler, ScreenshotHandler, ScriptHandler};

/// Rectangle in page coordinates (CSS pixels)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClipRect {
    /// Left edge
    pub x: f64,
    /// Top edge
    pub y: f64,
    /// Width
    pub width: f64,
    /// Height
    pub height: f64,
}

impl ClipRect {
    /// Create a rectangle
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Zero-area rectangles cannot be captured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// Area covered by a screenshot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ScreenshotScope {
    /// Visible viewport
    Viewport,
    /// Whole scrollable page
    FullPage,
    /// A rectangle, usually an element's box
    Clip(ClipRect),
}

/// Browser page operations the rest of the crate relies on
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Load a URL and wait for the load event
    async fn navigate(&mut self, url: &str) -> ProbeResult<()>;

    /// Evaluate a script and return its JSON result
    async fn evaluate(&self, script: &Script) -> ProbeResult<Value>;

    /// Capture a PNG
    async fn screenshot(&self, scope: ScreenshotScope) -> ProbeResult<Vec<u8>>;

    /// Resize the viewport
    async fn set_viewport(&mut self, width: u32, height: u32) -> ProbeResult<()>;

    /// URL of the loaded document
    async fn current_url(&self) -> ProbeResult<String>;

    /// Release the page
    async fn close(&mut self) -> ProbeResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_rect_empty() {
        assert!(ClipRect::new(0.0, 0.0, 0.0, 10.0).is_empty());
        assert!(!ClipRect::new(5.0, 5.0, 120.0, 40.0).is_empty());
    }

    #[test]
    fn test_scope_serializes() {
        let json = serde_json::to_string(&ScreenshotScope::Viewport).unwrap_or_default();
        assert_eq!(json, "\"Viewport\"");
    }
}
