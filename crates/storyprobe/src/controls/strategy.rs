//! Ways of reaching a story's args.
//!
//! A [`SyncStrategy`] either finds what it was asked for or reports
//! [`Lookup::NotFound`], in which case the synchronizer tries the next one.
//! Errors are reserved for failures that another strategy would not fix
//! (timeouts, broken scripts, values that never settle).

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use super::value::ControlValue;
use crate::result::{ProbeError, ProbeResult};
use crate::script::{self, Script};
use crate::story::{NavigateOptions, StoryId, ViewMode};
use crate::target::{RenderTargetClient, DEFAULT_POLL_INTERVAL_MS};

/// Outcome of a strategy attempt
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    /// The strategy handled the request
    Found(T),
    /// The strategy cannot see this story or control
    NotFound,
}

impl<T> Lookup<T> {
    /// Convert to an `Option`
    pub fn found(self) -> Option<T> {
        match self {
            Self::Found(v) => Some(v),
            Self::NotFound => None,
        }
    }
}

/// Arg map of one story
pub type ArgMap = BTreeMap<String, ControlValue>;

/// One way of reading and writing story args
#[async_trait]
pub trait SyncStrategy: Send + Sync + fmt::Debug {
    /// Name used in logs
    fn name(&self) -> &'static str;

    /// Read one arg
    async fn try_get(&self, id: &StoryId, name: &str) -> ProbeResult<Lookup<ControlValue>>;

    /// Read every arg
    async fn try_get_all(&self, id: &StoryId) -> ProbeResult<Lookup<ArgMap>>;

    /// Write one arg and wait until it reads back
    async fn try_set(
        &self,
        id: &StoryId,
        name: &str,
        value: &ControlValue,
    ) -> ProbeResult<Lookup<()>>;

    /// Write several args at once. Strategies without a batch path answer
    /// `NotFound` and the caller falls back to single writes.
    async fn try_set_many(&self, _id: &StoryId, _values: &ArgMap) -> ProbeResult<Lookup<()>> {
        Ok(Lookup::NotFound)
    }
}

/// Poll `read` until it yields `true` or the client's timeout passes
async fn settle<F, Fut>(client: &RenderTargetClient, what: &str, mut read: F) -> ProbeResult<()>
where
    F: FnMut() -> Fut + Send,
    Fut: std::future::Future<Output = ProbeResult<bool>> + Send,
{
    let deadline = tokio::time::Instant::now() + client.config().timeout();
    loop {
        if read().await? {
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(ProbeError::script(
                what,
                format!(
                    "value did not settle within {}ms",
                    client.config().storybook.timeout_ms
                ),
            ));
        }
        tokio::time::sleep(Duration::from_millis(DEFAULT_POLL_INTERVAL_MS)).await;
    }
}

fn args_from_answer(mut answer: Map<String, Value>) -> ArgMap {
    match answer.remove("args") {
        Some(Value::Object(args)) => args
            .into_iter()
            .map(|(k, v)| (k, ControlValue::from(v)))
            .collect(),
        _ => ArgMap::new(),
    }
}

// ============================================================================
// Story-store API
// ============================================================================

/// Reads and writes args through Storybook's in-page story store
#[derive(Debug, Clone)]
pub struct ApiStrategy {
    client: RenderTargetClient,
}

impl ApiStrategy {
    /// Create the strategy
    #[must_use]
    pub const fn new(client: RenderTargetClient) -> Self {
        Self { client }
    }

    async fn read(&self, id: &StoryId) -> ProbeResult<Option<ArgMap>> {
        let answer = self.client.evaluate(&Script::story_args_read(id.as_str())).await?;
        Ok(script::found(answer).map(args_from_answer))
    }
}

#[async_trait]
impl SyncStrategy for ApiStrategy {
    fn name(&self) -> &'static str {
        "api"
    }

    async fn try_get(&self, id: &StoryId, name: &str) -> ProbeResult<Lookup<ControlValue>> {
        Ok(match self.read(id).await? {
            Some(mut args) => args.remove(name).map_or(Lookup::NotFound, Lookup::Found),
            None => Lookup::NotFound,
        })
    }

    async fn try_get_all(&self, id: &StoryId) -> ProbeResult<Lookup<ArgMap>> {
        Ok(self.read(id).await?.map_or(Lookup::NotFound, Lookup::Found))
    }

    async fn try_set(
        &self,
        id: &StoryId,
        name: &str,
        value: &ControlValue,
    ) -> ProbeResult<Lookup<()>> {
        let mut values = ArgMap::new();
        values.insert(name.to_string(), value.clone());
        self.try_set_many(id, &values).await
    }

    async fn try_set_many(&self, id: &StoryId, values: &ArgMap) -> ProbeResult<Lookup<()>> {
        let payload: Map<String, Value> = values
            .iter()
            .map(|(k, v)| (k.clone(), Value::from(v.clone())))
            .collect();
        let answer = self
            .client
            .evaluate(&Script::story_args_write(id.as_str(), payload))
            .await?;
        if let Some(missing) = answer.get("missing") {
            debug!(story = %id, %missing, "story store does not know these args");
        }
        if script::found(answer).is_none() {
            return Ok(Lookup::NotFound);
        }
        settle(&self.client, "story-args-write", || async {
            let args = self.read(id).await?;
            Ok::<_, ProbeError>(
                args.is_some_and(|args| values.iter().all(|(k, v)| args.get(k) == Some(v))),
            )
        })
        .await?;
        Ok(Lookup::Found(()))
    }
}

// ============================================================================
// Controls panel
// ============================================================================

/// Drives the inputs of the controls addon panel in the manager UI
#[derive(Debug, Clone)]
pub struct UiStrategy {
    client: RenderTargetClient,
}

/// Panel readings and written values match when equal, when they print the
/// same (a text input holding `42` for a numeric arg), or when both are blank
/// (an emptied text input for a `null` arg)
fn ui_equivalent(reading: &ControlValue, expected: &ControlValue) -> bool {
    let blank = |v: &ControlValue| match v {
        ControlValue::Null => true,
        ControlValue::Text(s) => s.is_empty(),
        _ => false,
    };
    reading == expected
        || (blank(reading) && blank(expected))
        || reading.to_string() == expected.to_string()
}

impl UiStrategy {
    /// Create the strategy
    #[must_use]
    pub const fn new(client: RenderTargetClient) -> Self {
        Self { client }
    }

    /// Open the manager UI with the controls panel unless it already shows `id`
    async fn ensure_panel(&self, id: &StoryId) -> ProbeResult<()> {
        let current = self.client.current().await;
        let showing = current.is_some_and(|c| &c.story == id && c.mode == ViewMode::Full);
        if !showing {
            self.client
                .navigate_with(id, ViewMode::Full, &NavigateOptions::new().with_controls_panel())
                .await?;
        }
        Ok(())
    }

    async fn read(&self, name: &str) -> ProbeResult<Option<ControlValue>> {
        let answer = self.client.evaluate(&Script::control_read(name)).await?;
        Ok(script::found(answer).map(|map| reading(&map)))
    }
}

fn reading(map: &Map<String, Value>) -> ControlValue {
    let kind = map.get("kind").and_then(Value::as_str).unwrap_or("text");
    ControlValue::from_ui_reading(kind, map.get("value").unwrap_or(&Value::Null))
}

#[async_trait]
impl SyncStrategy for UiStrategy {
    fn name(&self) -> &'static str {
        "ui"
    }

    async fn try_get(&self, id: &StoryId, name: &str) -> ProbeResult<Lookup<ControlValue>> {
        self.ensure_panel(id).await?;
        Ok(self.read(name).await?.map_or(Lookup::NotFound, Lookup::Found))
    }

    async fn try_get_all(&self, id: &StoryId) -> ProbeResult<Lookup<ArgMap>> {
        self.ensure_panel(id).await?;
        let answer = self.client.evaluate(&Script::control_list()).await?;
        let Some(mut map) = script::found(answer) else {
            return Ok(Lookup::NotFound);
        };
        let controls = match map.remove("controls") {
            Some(Value::Object(controls)) => controls,
            _ => return Ok(Lookup::NotFound),
        };
        Ok(Lookup::Found(
            controls
                .into_iter()
                .filter_map(|(name, entry)| match entry {
                    Value::Object(entry) => Some((name, reading(&entry))),
                    _ => None,
                })
                .collect(),
        ))
    }

    async fn try_set(
        &self,
        id: &StoryId,
        name: &str,
        value: &ControlValue,
    ) -> ProbeResult<Lookup<()>> {
        self.ensure_panel(id).await?;
        let answer = self
            .client
            .evaluate(&Script::control_write(name, &value.to_ui_input()))
            .await?;
        if script::found(answer).is_none() {
            return Ok(Lookup::NotFound);
        }
        settle(&self.client, "control-write", || async {
            let current = self.read(name).await?;
            Ok::<_, ProbeError>(current.is_some_and(|current| ui_equivalent(&current, value)))
        })
        .await?;
        Ok(Lookup::Found(()))
    }
}
