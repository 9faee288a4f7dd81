//! Visual regression against PNG baselines.
//!
//! A comparison captures the story, then either stores the capture as the
//! baseline (first run, or update mode) or diffs it pixel by pixel against the
//! stored one. The mismatch ratio is `differing pixels / compared pixels` and
//! the check passes iff it is at most the threshold. Different image sizes are
//! a hard [`ProbeError::DimensionMismatch`] regardless of threshold.

use std::path::PathBuf;

use image::{DynamicImage, GenericImageView, ImageEncoder, RgbaImage};
use serde::Serialize;
use tracing::{info, warn};

use crate::baseline::{BaselineKind, BaselineStore, Verdict};
use crate::config::ScreenshotMode;
use crate::driver::{ClipRect, ScreenshotScope};
use crate::result::{ProbeError, ProbeResult};
use crate::script::Script;
use crate::story::StoryId;
use crate::target::RenderTargetClient;

// =============================================================================
// Pixel comparison
// =============================================================================

/// Rectangle excluded from comparison, in image pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MaskRegion {
    /// Left edge
    pub x: u32,
    /// Top edge
    pub y: u32,
    /// Width
    pub width: u32,
    /// Height
    pub height: u32,
}

impl MaskRegion {
    /// Create a mask
    #[must_use]
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Is the pixel inside the mask
    #[must_use]
    pub const fn contains(&self, px: u32, py: u32) -> bool {
        px >= self.x
            && px < self.x.saturating_add(self.width)
            && py >= self.y
            && py < self.y.saturating_add(self.height)
    }
}

/// Pixel counts from one comparison
#[derive(Debug, Clone, Default)]
pub struct PixelDiff {
    /// Pixels over the channel tolerance
    pub diff_pixels: u64,
    /// Pixels compared (masked pixels excluded)
    pub total_pixels: u64,
    /// Largest per-pixel channel difference
    pub max_color_diff: u32,
    /// PNG with differing pixels in red, present when anything differs
    pub diff_image: Option<Vec<u8>>,
}

impl PixelDiff {
    /// Fraction of compared pixels that differ, in `[0, 1]`
    #[must_use]
    pub fn mismatch_ratio(&self) -> f64 {
        if self.total_pixels == 0 {
            0.0
        } else {
            #[allow(clippy::cast_precision_loss)]
            let ratio = self.diff_pixels as f64 / self.total_pixels as f64;
            ratio
        }
    }

    /// No pixel differs
    #[must_use]
    pub const fn is_identical(&self) -> bool {
        self.diff_pixels == 0
    }
}

/// Pixel-wise image comparison
#[derive(Debug, Clone, Default)]
pub struct ImageComparator {
    color_threshold: u32,
    masks: Vec<MaskRegion>,
}

impl ImageComparator {
    /// Exact comparison, no masks
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Summed channel difference a pixel may have and still count as equal
    #[must_use]
    pub const fn with_color_threshold(mut self, threshold: u32) -> Self {
        self.color_threshold = threshold;
        self
    }

    /// Exclude a region
    #[must_use]
    pub fn with_mask(mut self, mask: MaskRegion) -> Self {
        self.masks.push(mask);
        self
    }

    /// Exclude several regions
    #[must_use]
    pub fn with_masks(mut self, masks: impl IntoIterator<Item = MaskRegion>) -> Self {
        self.masks.extend(masks);
        self
    }

    /// Compare two encoded images
    ///
    /// # Errors
    ///
    /// Returns error if either image cannot be decoded or the sizes differ
    pub fn compare(&self, baseline: &[u8], actual: &[u8]) -> ProbeResult<PixelDiff> {
        let baseline = image::load_from_memory(baseline).map_err(|e| ProbeError::Image {
            message: format!("Failed to decode baseline image: {e}"),
        })?;
        let actual = image::load_from_memory(actual).map_err(|e| ProbeError::Image {
            message: format!("Failed to decode actual image: {e}"),
        })?;
        self.compare_images(&baseline, &actual)
    }

    /// Compare two decoded images
    ///
    /// # Errors
    ///
    /// Returns error if the sizes differ or the diff image cannot be encoded
    pub fn compare_images(
        &self,
        baseline: &DynamicImage,
        actual: &DynamicImage,
    ) -> ProbeResult<PixelDiff> {
        let (width, height) = actual.dimensions();
        let (base_width, base_height) = baseline.dimensions();
        if width != base_width || height != base_height {
            return Err(ProbeError::DimensionMismatch {
                baseline_width: base_width,
                baseline_height: base_height,
                actual_width: width,
                actual_height: height,
            });
        }

        let actual = actual.to_rgba8();
        let baseline = baseline.to_rgba8();
        let mut diff_img = RgbaImage::new(width, height);
        let mut result = PixelDiff::default();

        for (x, y, pixel) in actual.enumerate_pixels() {
            if self.masks.iter().any(|m| m.contains(x, y)) {
                diff_img.put_pixel(x, y, image::Rgba([0, 0, 255, 64]));
                continue;
            }
            result.total_pixels += 1;
            let delta = pixel_diff(*pixel, *baseline.get_pixel(x, y));
            if delta > self.color_threshold {
                result.diff_pixels += 1;
                result.max_color_diff = result.max_color_diff.max(delta);
                diff_img.put_pixel(x, y, image::Rgba([255, 0, 0, 255]));
            } else {
                let image::Rgba([r, g, b, _]) = *pixel;
                diff_img.put_pixel(x, y, image::Rgba([r / 2, g / 2, b / 2, 128]));
            }
        }

        if !result.is_identical() {
            result.diff_image = Some(encode_png(&diff_img)?);
        }
        Ok(result)
    }
}

/// Sum of absolute channel differences, alpha included
fn pixel_diff(a: image::Rgba<u8>, b: image::Rgba<u8>) -> u32 {
    a.0.iter()
        .zip(b.0.iter())
        .map(|(x, y)| u32::from(x.abs_diff(*y)))
        .sum()
}

/// Encode RGBA pixels as PNG
pub fn encode_png(img: &RgbaImage) -> ProbeResult<Vec<u8>> {
    let mut buffer = Vec::new();
    image::codecs::png::PngEncoder::new(&mut buffer)
        .write_image(
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgba8,
        )
        .map_err(|e| ProbeError::Image {
            message: format!("Failed to encode PNG: {e}"),
        })?;
    Ok(buffer)
}

// =============================================================================
// Engine
// =============================================================================

/// What part of the story to capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureTarget {
    /// Whole scrollable page
    FullPage,
    /// Visible viewport
    Viewport,
    /// Bounding box of the first element matching a selector
    Element(String),
}

impl From<ScreenshotMode> for CaptureTarget {
    fn from(mode: ScreenshotMode) -> Self {
        match mode {
            ScreenshotMode::Full => Self::FullPage,
            ScreenshotMode::Viewport => Self::Viewport,
        }
    }
}

/// Options for [`VisualDiffEngine::compare_screenshot_with`]
#[derive(Debug, Clone, Default)]
pub struct VisualOptions {
    /// Allowed mismatch ratio; the configured default when `None`
    pub threshold: Option<f64>,
    /// Capture area; the configured screenshot mode when `None`
    pub target: Option<CaptureTarget>,
    /// Per-pixel channel tolerance, 0 = exact
    pub color_threshold: u32,
    /// Regions ignored by the comparison
    pub masks: Vec<MaskRegion>,
}

impl VisualOptions {
    /// Defaults from configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the threshold
    #[must_use]
    pub const fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    /// Capture one element
    #[must_use]
    pub fn element(mut self, selector: impl Into<String>) -> Self {
        self.target = Some(CaptureTarget::Element(selector.into()));
        self
    }

    /// Set the capture area
    #[must_use]
    pub fn with_target(mut self, target: CaptureTarget) -> Self {
        self.target = Some(target);
        self
    }

    /// Set the per-pixel tolerance
    #[must_use]
    pub const fn with_color_threshold(mut self, threshold: u32) -> Self {
        self.color_threshold = threshold;
        self
    }

    /// Ignore a region
    #[must_use]
    pub fn with_mask(mut self, mask: MaskRegion) -> Self {
        self.masks.push(mask);
        self
    }
}

/// Outcome of a visual comparison
#[derive(Debug, Clone, Serialize)]
pub struct VisualDiff {
    /// Story
    pub story: StoryId,
    /// Baseline name
    pub name: String,
    /// Verdict
    pub verdict: Verdict,
    /// Fraction of differing pixels
    pub mismatch_ratio: f64,
    /// Differing pixels
    pub diff_pixels: u64,
    /// Compared pixels
    pub total_pixels: u64,
    /// Threshold applied
    pub threshold: f64,
    /// Baseline file
    pub baseline_path: PathBuf,
    /// Diff image, written on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff_path: Option<PathBuf>,
}

impl VisualDiff {
    /// Anything but a failure
    #[must_use]
    pub const fn passed(&self) -> bool {
        self.verdict.is_success()
    }

    /// Turn a failed verdict into [`ProbeError::VisualMismatch`]
    pub fn assert_passed(&self) -> ProbeResult<()> {
        if self.passed() {
            Ok(())
        } else {
            Err(ProbeError::VisualMismatch {
                name: self.name.clone(),
                ratio: self.mismatch_ratio,
                threshold: self.threshold,
            })
        }
    }
}

/// Screenshot capture and baseline comparison
#[derive(Debug, Clone)]
pub struct VisualDiffEngine {
    client: RenderTargetClient,
    store: BaselineStore,
    update_baselines: bool,
}

impl VisualDiffEngine {
    /// Engine using the client's configured baseline directory and update mode
    #[must_use]
    pub fn new(client: RenderTargetClient) -> Self {
        let store = BaselineStore::from_config(client.config());
        let update_baselines = client.config().visual.update_baselines;
        Self {
            client,
            store,
            update_baselines,
        }
    }

    /// Use another store
    #[must_use]
    pub fn with_store(mut self, store: BaselineStore) -> Self {
        self.store = store;
        self
    }

    /// Overwrite baselines on every comparison
    #[must_use]
    pub const fn with_update_baselines(mut self, update: bool) -> Self {
        self.update_baselines = update;
        self
    }

    /// Baseline store in use
    #[must_use]
    pub const fn store(&self) -> &BaselineStore {
        &self.store
    }

    /// Compare with the configured capture area and `threshold` (default from
    /// configuration, normally 0.2)
    pub async fn compare_screenshot(
        &self,
        id: &StoryId,
        name: &str,
        threshold: Option<f64>,
    ) -> ProbeResult<VisualDiff> {
        let options = VisualOptions {
            threshold,
            ..VisualOptions::default()
        };
        self.compare_screenshot_with(id, name, &options).await
    }

    /// Compare with explicit options
    pub async fn compare_screenshot_with(
        &self,
        id: &StoryId,
        name: &str,
        options: &VisualOptions,
    ) -> ProbeResult<VisualDiff> {
        let threshold = options
            .threshold
            .unwrap_or(self.client.config().visual.threshold);
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ProbeError::config(format!(
                "threshold must be within 0.0-1.0, got {threshold}"
            )));
        }
        let baseline_path = self.store.path(BaselineKind::Visual, id, name)?;
        let capture = self.capture(id, options.target.as_ref()).await?;

        let exists = baseline_path.is_file();
        if !exists || self.update_baselines {
            let verdict = if exists {
                Verdict::BaselineUpdated
            } else {
                Verdict::BaselineCreated
            };
            return self.store_baseline(id, name, &capture, verdict, threshold);
        }

        let baseline = self.store.read(BaselineKind::Visual, id, name)?;
        let diff = ImageComparator::new()
            .with_color_threshold(options.color_threshold)
            .with_masks(options.masks.iter().copied())
            .compare(&baseline, &capture)?;
        let ratio = diff.mismatch_ratio();

        let (verdict, diff_path) = if ratio <= threshold {
            info!(story = %id, name, ratio, threshold, "screenshot matches baseline");
            (Verdict::Pass, None)
        } else {
            let diff_path = match diff.diff_image {
                Some(ref png) => Some(self.store.write_diff(id, name, "diff", png)?),
                None => None,
            };
            self.store.write_diff(id, name, "actual", &capture)?;
            warn!(
                story = %id,
                name,
                ratio,
                threshold,
                diff_pixels = diff.diff_pixels,
                diff = ?diff_path,
                "screenshot differs from baseline"
            );
            (Verdict::Fail, diff_path)
        };

        Ok(VisualDiff {
            story: id.clone(),
            name: name.to_string(),
            verdict,
            mismatch_ratio: ratio,
            diff_pixels: diff.diff_pixels,
            total_pixels: diff.total_pixels,
            threshold,
            baseline_path,
            diff_path,
        })
    }

    /// Overwrite the baseline with a fresh capture
    pub async fn update_screenshot(&self, id: &StoryId, name: &str) -> ProbeResult<VisualDiff> {
        let exists = self.store.exists(BaselineKind::Visual, id, name)?;
        let capture = self.capture(id, None).await?;
        let verdict = if exists {
            Verdict::BaselineUpdated
        } else {
            Verdict::BaselineCreated
        };
        let threshold = self.client.config().visual.threshold;
        self.store_baseline(id, name, &capture, verdict, threshold)
    }

    /// Capture the story with the configured area. The PNG is also written
    /// under the capture directory as `{name}.png`; baselines are untouched.
    pub async fn take_screenshot(&self, id: &StoryId, name: &str) -> ProbeResult<Vec<u8>> {
        let png = self.capture(id, None).await?;
        let path = self.store.write_capture(id, name, &png)?;
        info!(story = %id, name, ?path, "screenshot taken");
        Ok(png)
    }

    fn store_baseline(
        &self,
        id: &StoryId,
        name: &str,
        capture: &[u8],
        verdict: Verdict,
        threshold: f64,
    ) -> ProbeResult<VisualDiff> {
        let (width, height) = image::load_from_memory(capture)?.dimensions();
        let baseline_path = self.store.write(BaselineKind::Visual, id, name, capture)?;
        warn!(story = %id, name, path = ?baseline_path, %verdict, "visual baseline written");
        Ok(VisualDiff {
            story: id.clone(),
            name: name.to_string(),
            verdict,
            mismatch_ratio: 0.0,
            diff_pixels: 0,
            total_pixels: u64::from(width) * u64::from(height),
            threshold,
            baseline_path,
            diff_path: None,
        })
    }

    async fn capture(&self, id: &StoryId, target: Option<&CaptureTarget>) -> ProbeResult<Vec<u8>> {
        self.client.ensure_loaded(id).await?;
        let default = CaptureTarget::from(self.client.config().visual.screenshot_mode);
        let scope = match target.unwrap_or(&default) {
            CaptureTarget::FullPage => ScreenshotScope::FullPage,
            CaptureTarget::Viewport => ScreenshotScope::Viewport,
            CaptureTarget::Element(selector) => {
                let rect = self.element_clip(selector).await?;
                ScreenshotScope::Clip(rect)
            }
        };
        self.client.screenshot(scope).await
    }

    async fn element_clip(&self, selector: &str) -> ProbeResult<ClipRect> {
        let map = self.client.element(&Script::element_clip(selector)).await?;
        let field = |k: &str| map.get(k).and_then(serde_json::Value::as_f64).unwrap_or(0.0);
        let rect = ClipRect::new(field("x"), field("y"), field("width"), field("height"));
        if rect.is_empty() {
            warn!(%selector, "element has an empty box");
            return Err(ProbeError::SelectorNotFound {
                selector: selector.to_string(),
            });
        }
        Ok(rect)
    }
}
