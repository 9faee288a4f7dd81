//! Scripted driver for tests.
//!
//! `MockDriver` answers each [`ScriptKind`] with a closure registered by the
//! test. Clones share state, so a test can hand one clone to a
//! [`crate::RenderTargetClient`] and keep another to inspect the call history.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{PageDriver, ScreenshotScope};
use crate::result::{ProbeError, ProbeResult};
use crate::script::{Script, ScriptKind};

/// Answers one script kind from its request payload
pub type ScriptHandler = Arc<dyn Fn(&Value) -> ProbeResult<Value> + Send + Sync>;

/// Called with every navigated URL
pub type NavigateHandler = Arc<dyn Fn(&str) -> ProbeResult<()> + Send + Sync>;

/// Produces PNG bytes for a screenshot request
pub type ScreenshotHandler = Arc<dyn Fn(ScreenshotScope) -> ProbeResult<Vec<u8>> + Send + Sync>;

#[derive(Default)]
struct MockState {
    url: String,
    navigations: Vec<String>,
    scripts: Vec<Script>,
    call_history: Vec<String>,
    viewport: Option<(u32, u32)>,
    handlers: HashMap<ScriptKind, ScriptHandler>,
    on_navigate: Option<NavigateHandler>,
    on_screenshot: Option<ScreenshotHandler>,
    navigation_delay: Option<Duration>,
    closed: bool,
}

/// Mock driver for unit testing
#[derive(Clone, Default)]
pub struct MockDriver {
    state: Arc<Mutex<MockState>>,
}

impl fmt::Debug for MockDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("MockDriver")
            .field("url", &state.url)
            .field("navigations", &state.navigations.len())
            .field("scripts", &state.scripts.len())
            .field("handlers", &state.handlers.len())
            .finish()
    }
}

impl MockDriver {
    /// Create new mock driver
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Answer `kind` with `handler`
    #[must_use]
    pub fn on_script<F>(self, kind: ScriptKind, handler: F) -> Self
    where
        F: Fn(&Value) -> ProbeResult<Value> + Send + Sync + 'static,
    {
        self.lock().handlers.insert(kind, Arc::new(handler));
        self
    }

    /// Answer `kind` with a fixed value
    #[must_use]
    pub fn with_answer(self, kind: ScriptKind, answer: Value) -> Self {
        self.on_script(kind, move |_| Ok(answer.clone()))
    }

    /// Observe or reject navigations
    #[must_use]
    pub fn on_navigate<F>(self, handler: F) -> Self
    where
        F: Fn(&str) -> ProbeResult<()> + Send + Sync + 'static,
    {
        self.lock().on_navigate = Some(Arc::new(handler));
        self
    }

    /// Produce screenshots with `handler`
    #[must_use]
    pub fn on_screenshot<F>(self, handler: F) -> Self
    where
        F: Fn(ScreenshotScope) -> ProbeResult<Vec<u8>> + Send + Sync + 'static,
    {
        self.lock().on_screenshot = Some(Arc::new(handler));
        self
    }

    /// Return the same PNG for every screenshot
    #[must_use]
    pub fn with_screenshot(self, png: Vec<u8>) -> Self {
        self.on_screenshot(move |_| Ok(png.clone()))
    }

    /// Make each navigation take this long
    #[must_use]
    pub fn with_navigation_delay(self, delay: Duration) -> Self {
        self.lock().navigation_delay = Some(delay);
        self
    }

    /// Every URL navigated to, in order
    #[must_use]
    pub fn navigations(&self) -> Vec<String> {
        self.lock().navigations.clone()
    }

    /// Every evaluated script, in order
    #[must_use]
    pub fn scripts(&self) -> Vec<Script> {
        self.lock().scripts.clone()
    }

    /// How many times `kind` was evaluated
    #[must_use]
    pub fn script_count(&self, kind: ScriptKind) -> usize {
        self.lock().scripts.iter().filter(|s| s.kind == kind).count()
    }

    /// Get call history
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.lock().call_history.clone()
    }

    /// Check if method was called
    #[must_use]
    pub fn was_called(&self, method: &str) -> bool {
        self.lock().call_history.iter().any(|c| c.starts_with(method))
    }

    /// Last viewport set through the driver
    #[must_use]
    pub fn viewport(&self) -> Option<(u32, u32)> {
        self.lock().viewport
    }

    /// Whether `close` was called
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

/// Answer used when no handler is registered
fn default_answer(kind: ScriptKind) -> Value {
    match kind {
        ScriptKind::StoryReady => json!({ "ready": true }),
        _ => json!({ "found": false }),
    }
}

#[async_trait]
impl PageDriver for MockDriver {
    async fn navigate(&mut self, url: &str) -> ProbeResult<()> {
        let (handler, delay) = {
            let mut state = self.lock();
            state.call_history.push(format!("navigate:{url}"));
            (state.on_navigate.clone(), state.navigation_delay)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(handler) = handler {
            handler(url)?;
        }
        let mut state = self.lock();
        state.navigations.push(url.to_string());
        state.url = url.to_string();
        Ok(())
    }

    async fn evaluate(&self, script: &Script) -> ProbeResult<Value> {
        let handler = {
            let mut state = self.lock();
            state.call_history.push(format!("evaluate:{}", script.kind));
            state.scripts.push(script.clone());
            state.handlers.get(&script.kind).cloned()
        };
        match handler {
            Some(handler) => handler(&script.payload),
            None => Ok(default_answer(script.kind)),
        }
    }

    async fn screenshot(&self, scope: ScreenshotScope) -> ProbeResult<Vec<u8>> {
        let handler = {
            let mut state = self.lock();
            state.call_history.push(format!("screenshot:{scope:?}"));
            state.on_screenshot.clone()
        };
        match handler {
            Some(handler) => handler(scope),
            None => Err(ProbeError::Image {
                message: "MockDriver has no screenshot configured".to_string(),
            }),
        }
    }

    async fn set_viewport(&mut self, width: u32, height: u32) -> ProbeResult<()> {
        let mut state = self.lock();
        state.call_history.push(format!("set_viewport:{width}x{height}"));
        state.viewport = Some((width, height));
        Ok(())
    }

    async fn current_url(&self) -> ProbeResult<String> {
        Ok(self.lock().url.clone())
    }

    async fn close(&mut self) -> ProbeResult<()> {
        let mut state = self.lock();
        state.call_history.push("close".to_string());
        state.closed = true;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod mock_driver_tests {
        use super::*;

        #[tokio::test]
        async fn test_navigate_records_history() {
            let mut driver = MockDriver::new();
            driver.navigate("http://sb/iframe.html?id=a--b").await.unwrap();
            assert_eq!(driver.navigations(), vec!["http://sb/iframe.html?id=a--b"]);
            assert_eq!(driver.current_url().await.unwrap(), "http://sb/iframe.html?id=a--b");
            assert!(driver.was_called("navigate"));
        }

        #[tokio::test]
        async fn test_clones_share_state() {
            let observer = MockDriver::new();
            let mut driver = observer.clone();
            driver.navigate("about:blank").await.unwrap();
            assert_eq!(observer.navigations().len(), 1);
        }

        #[tokio::test]
        async fn test_default_answers() {
            let driver = MockDriver::new();
            let ready = driver.evaluate(&Script::story_ready()).await.unwrap();
            assert_eq!(ready, json!({"ready": true}));
            let text = driver.evaluate(&Script::text_content("p")).await.unwrap();
            assert_eq!(text, json!({"found": false}));
            assert_eq!(driver.script_count(ScriptKind::TextContent), 1);
        }

        #[tokio::test]
        async fn test_handler_sees_payload() {
            let driver = MockDriver::new().on_script(ScriptKind::ComputedStyle, |req| {
                Ok(json!({"found": true, "value": req["property"]}))
            });
            let answer = driver
                .evaluate(&Script::computed_style("button", "width"))
                .await
                .unwrap();
            assert_eq!(answer["value"], "width");
        }

        #[tokio::test]
        async fn test_navigate_handler_can_fail() {
            let mut driver = MockDriver::new().on_navigate(|url| {
                Err(ProbeError::NavigationFailed {
                    url: url.to_string(),
                    message: "refused".into(),
                })
            });
            assert!(driver.navigate("http://down").await.is_err());
            assert!(driver.navigations().is_empty());
        }

        #[tokio::test]
        async fn test_screenshot_requires_configuration() {
            let driver = MockDriver::new();
            assert!(driver.screenshot(ScreenshotScope::Viewport).await.is_err());
            let driver = driver.with_screenshot(vec![1, 2, 3]);
            assert_eq!(driver.screenshot(ScreenshotScope::FullPage).await.unwrap(), vec![1, 2, 3]);
        }

        #[tokio::test]
        async fn test_viewport_and_close() {
            let mut driver = MockDriver::new();
            driver.set_viewport(800, 600).await.unwrap();
            driver.close().await.unwrap();
            assert_eq!(driver.viewport(), Some((800, 600)));
            assert!(driver.is_closed());
        }
    }
}
