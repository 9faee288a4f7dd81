//! Render target client.
//!
//! [`RenderTargetClient`] is the test-scoped handle every engine receives at
//! construction. It owns one browser page through a [`PageDriver`], turns story
//! identifiers into Storybook URLs and bounds every navigation and script with
//! the configured timeout. Clones share the same page.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::ProbeConfig;
use crate::driver::{PageDriver, ScreenshotScope};
use crate::result::{ProbeError, ProbeResult};
use crate::script::{self, Script};
use crate::story::{story_url, NavigateOptions, StoryId, ViewMode};

/// Poll interval for readiness and selector waits
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

/// The story currently loaded in the page
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedStory {
    /// Story identifier
    pub story: StoryId,
    /// Page it was opened in
    pub mode: ViewMode,
    /// Exact URL
    pub url: String,
}

struct Inner {
    driver: Box<dyn PageDriver>,
    loaded: Option<LoadedStory>,
}

/// Handle to one browser page showing Storybook
#[derive(Clone)]
pub struct RenderTargetClient {
    inner: Arc<Mutex<Inner>>,
    config: Arc<ProbeConfig>,
}

impl fmt::Debug for RenderTargetClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderTargetClient")
            .field("base_url", &self.config.base_url())
            .finish_non_exhaustive()
    }
}

impl RenderTargetClient {
    /// Wrap a driver
    pub fn new(driver: impl PageDriver + 'static, config: ProbeConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                driver: Box::new(driver),
                loaded: None,
            })),
            config: Arc::new(config),
        }
    }

    /// Launch Chromium and wrap it
    ///
    /// # Errors
    ///
    /// Returns error if the browser cannot be launched
    #[cfg(feature = "browser")]
    pub async fn launch(config: ProbeConfig) -> ProbeResult<Self> {
        let driver = crate::driver::ChromiumDriver::launch(&config).await?;
        Ok(Self::new(driver, config))
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Open a story
    pub async fn navigate(&self, id: &StoryId, mode: ViewMode) -> ProbeResult<()> {
        self.navigate_with(id, mode, &NavigateOptions::default())
            .await
    }

    /// Open a story with initial args, globals or a selector to wait for.
    ///
    /// Completes once the story document reports ready. Exceeding the
    /// configured timeout yields [`ProbeError::NavigationTimeout`].
    pub async fn navigate_with(
        &self,
        id: &StoryId,
        mode: ViewMode,
        options: &NavigateOptions,
    ) -> ProbeResult<()> {
        let url = story_url(self.config.base_url(), id, mode, options);
        let timeout = self.config.timeout();
        info!(story = %id, ?mode, %url, "navigate");

        let mut inner = self.inner.lock().await;
        inner.loaded = None;
        let driver = inner.driver.as_mut();
        let load = async {
            driver.navigate(&url).await?;
            wait_ready(&*driver).await;
            Ok::<(), ProbeError>(())
        };
        match tokio::time::timeout(timeout, load).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(ProbeError::NavigationTimeout {
                    url,
                    ms: self.config.storybook.timeout_ms,
                })
            }
        }
        inner.loaded = Some(LoadedStory {
            story: id.clone(),
            mode,
            url,
        });
        drop(inner);

        if let Some(ref selector) = options.wait_for_selector {
            self.wait_for_selector(selector, timeout).await?;
        }
        self.slow_mo().await;
        Ok(())
    }

    /// Story currently loaded, if any
    pub async fn current(&self) -> Option<LoadedStory> {
        self.inner.lock().await.loaded.clone()
    }

    /// Open `id` in the preview iframe unless it is already loaded in any mode
    pub async fn ensure_loaded(&self, id: &StoryId) -> ProbeResult<()> {
        let loaded = self.current().await;
        if loaded.map_or(true, |l| &l.story != id) {
            self.navigate(id, ViewMode::Iframe).await?;
        }
        Ok(())
    }

    /// Evaluate a script within the configured timeout
    pub async fn evaluate(&self, script: &Script) -> ProbeResult<Value> {
        debug!(script = %script.kind, "evaluate");
        let result = {
            let inner = self.inner.lock().await;
            tokio::time::timeout(self.config.timeout(), inner.driver.evaluate(script)).await
        };
        let value = result.map_err(|_| ProbeError::ScriptTimeout {
            script: script.kind.name().to_string(),
            ms: self.config.storybook.timeout_ms,
        })??;
        if script.kind.is_mutation() {
            self.slow_mo().await;
        }
        Ok(value)
    }

    /// Evaluate a script and deserialize its answer
    pub async fn evaluate_as<T: serde::de::DeserializeOwned>(
        &self,
        script: &Script,
    ) -> ProbeResult<T> {
        let value = self.evaluate(script).await?;
        serde_json::from_value(value).map_err(|e| ProbeError::script(script.kind.name(), e.to_string()))
    }

    /// Evaluate an element script; a `{found: false}` answer becomes
    /// [`ProbeError::SelectorNotFound`]
    pub async fn element(&self, script: &Script) -> ProbeResult<Map<String, Value>> {
        let answer = self.evaluate(script).await?;
        script::found(answer).ok_or_else(|| {
            let selector = script.param("selector").unwrap_or_default().to_string();
            warn!(%selector, script = %script.kind, "selector not found in story");
            ProbeError::SelectorNotFound { selector }
        })
    }

    /// Poll until `selector` matches in the story document
    pub async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> ProbeResult<()> {
        let probe = Script::element_exists(selector);
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let answer = self.evaluate(&probe).await?;
            if script::found(answer).is_some() {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                warn!(%selector, ms = timeout.as_millis() as u64, "selector did not appear");
                return Err(ProbeError::SelectorNotFound {
                    selector: selector.to_string(),
                });
            }
            tokio::time::sleep(Duration::from_millis(DEFAULT_POLL_INTERVAL_MS)).await;
        }
    }

    /// Capture a PNG
    pub async fn screenshot(&self, scope: ScreenshotScope) -> ProbeResult<Vec<u8>> {
        let inner = self.inner.lock().await;
        inner.driver.screenshot(scope).await
    }

    /// Resize the viewport
    pub async fn set_viewport(&self, width: u32, height: u32) -> ProbeResult<()> {
        let mut inner = self.inner.lock().await;
        inner.driver.set_viewport(width, height).await
    }

    /// URL reported by the browser
    pub async fn current_url(&self) -> ProbeResult<String> {
        let inner = self.inner.lock().await;
        inner.driver.current_url().await
    }

    /// Close the page
    pub async fn close(&self) -> ProbeResult<()> {
        let mut inner = self.inner.lock().await;
        inner.loaded = None;
        inner.driver.close().await
    }

    async fn slow_mo(&self) {
        let ms = self.config.browser.slow_mo_ms;
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }
}

/// Poll the readiness script until it answers `ready: true`.
/// Errors while the new document is still loading count as not ready; the
/// caller's timeout bounds the loop.
async fn wait_ready(driver: &dyn PageDriver) {
    let probe = Script::story_ready();
    loop {
        match driver.evaluate(&probe).await {
            Ok(answer) if answer.get("ready").and_then(Value::as_bool) == Some(true) => return,
            Ok(_) => {}
            Err(e) => debug!(error = %e, "story not ready"),
        }
        tokio::time::sleep(Duration::from_millis(DEFAULT_POLL_INTERVAL_MS)).await;
    }
}
