//! Chromium driver over the DevTools protocol.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, CaptureScreenshotParams, Viewport as CdpViewport,
};
use chromiumoxide::page::{Page as CdpPage, ScreenshotParams};
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{PageDriver, ScreenshotScope};
use crate::config::{BrowserEngine, ProbeConfig};
use crate::result::{ProbeError, ProbeResult};
use crate::script::Script;

/// Page in a Chromium instance launched or attached over CDP
#[derive(Debug)]
pub struct ChromiumDriver {
    browser: Arc<Mutex<CdpBrowser>>,
    page: CdpPage,
    handle: tokio::task::JoinHandle<()>,
}

impl ChromiumDriver {
    /// Launch Chromium with the browser settings from `config`
    ///
    /// # Errors
    ///
    /// Returns error if the browser cannot start
    pub async fn launch(config: &ProbeConfig) -> ProbeResult<Self> {
        let settings = &config.browser;
        if settings.engine != BrowserEngine::Chromium {
            warn!(
                engine = ?settings.engine,
                fallback = ?settings.engine.fallback(),
                "engine not available over CDP, using fallback"
            );
        }

        let mut builder = CdpConfig::builder()
            .no_sandbox()
            .window_size(settings.viewport.width, settings.viewport.height);
        if !settings.headless {
            builder = builder.with_head();
        }
        if let Some(ref path) = settings.executable {
            builder = builder.chrome_executable(path);
        }
        let cdp_config = builder
            .build()
            .map_err(|message| ProbeError::BrowserLaunch { message })?;

        let (browser, handler) =
            CdpBrowser::launch(cdp_config)
                .await
                .map_err(|e| ProbeError::BrowserLaunch {
                    message: e.to_string(),
                })?;
        info!(headless = settings.headless, "launched chromium");

        let mut driver = Self::attach(browser, handler).await?;
        driver
            .set_viewport(settings.viewport.width, settings.viewport.height)
            .await?;
        Ok(driver)
    }

    /// Attach to a running browser through its DevTools websocket URL
    ///
    /// # Errors
    ///
    /// Returns error if the connection fails
    pub async fn connect(ws_url: &str) -> ProbeResult<Self> {
        let (browser, handler) =
            CdpBrowser::connect(ws_url)
                .await
                .map_err(|e| ProbeError::BrowserLaunch {
                    message: e.to_string(),
                })?;
        info!(ws_url, "connected to chromium");
        Self::attach(browser, handler).await
    }

    async fn attach(browser: CdpBrowser, mut handler: chromiumoxide::Handler) -> ProbeResult<Self> {
        let handle = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| ProbeError::BrowserLaunch {
                message: e.to_string(),
            })?;
        Ok(Self {
            browser: Arc::new(Mutex::new(browser)),
            page,
            handle,
        })
    }

    fn image_error(e: impl std::fmt::Display) -> ProbeError {
        ProbeError::Image {
            message: e.to_string(),
        }
    }
}

#[async_trait]
impl PageDriver for ChromiumDriver {
    async fn navigate(&mut self, url: &str) -> ProbeResult<()> {
        self.page
            .goto(url)
            .await
            .map_err(|e| ProbeError::NavigationFailed {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn evaluate(&self, script: &Script) -> ProbeResult<Value> {
        debug!(script = %script.kind, "evaluate");
        let result = self
            .page
            .evaluate(script.render())
            .await
            .map_err(|e| ProbeError::script(script.kind.name(), e.to_string()))?;
        result
            .into_value::<Value>()
            .map_err(|e| ProbeError::script(script.kind.name(), e.to_string()))
    }

    async fn screenshot(&self, scope: ScreenshotScope) -> ProbeResult<Vec<u8>> {
        match scope {
            ScreenshotScope::FullPage => self
                .page
                .screenshot(
                    ScreenshotParams::builder()
                        .format(CaptureScreenshotFormat::Png)
                        .full_page(true)
                        .build(),
                )
                .await
                .map_err(Self::image_error),
            ScreenshotScope::Viewport | ScreenshotScope::Clip(_) => {
                let mut params = CaptureScreenshotParams::builder().format(CaptureScreenshotFormat::Png);
                if let ScreenshotScope::Clip(rect) = scope {
                    let clip = CdpViewport::builder()
                        .x(rect.x)
                        .y(rect.y)
                        .width(rect.width)
                        .height(rect.height)
                        .scale(1.0)
                        .build()
                        .map_err(Self::image_error)?;
                    params = params.clip(clip).capture_beyond_viewport(true);
                }
                let shot = self
                    .page
                    .execute(params.build())
                    .await
                    .map_err(Self::image_error)?;
                base64::engine::general_purpose::STANDARD
                    .decode(&shot.data)
                    .map_err(Self::image_error)
            }
        }
    }

    async fn set_viewport(&mut self, width: u32, height: u32) -> ProbeResult<()> {
        let params =
            SetDeviceMetricsOverrideParams::new(i64::from(width), i64::from(height), 1.0, false);
        self.page
            .execute(params)
            .await
            .map_err(|e| ProbeError::script("set-viewport", e.to_string()))?;
        Ok(())
    }

    async fn current_url(&self) -> ProbeResult<String> {
        let url = self
            .page
            .url()
            .await
            .map_err(|e| ProbeError::script("current-url", e.to_string()))?;
        Ok(url.unwrap_or_default())
    }

    async fn close(&mut self) -> ProbeResult<()> {
        let mut browser = self.browser.lock().await;
        browser
            .close()
            .await
            .map_err(|e| ProbeError::BrowserLaunch {
                message: e.to_string(),
            })?;
        self.handle.abort();
        Ok(())
    }
}
