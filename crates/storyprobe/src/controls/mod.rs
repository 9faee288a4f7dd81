//! Control synchronization.
//!
//! [`ControlSynchronizer`] pushes prop values into a rendered story and reads
//! them back. Strategies are tried in priority order: the in-page story store
//! first, then the controls panel of the manager UI. The first strategy that
//! finds the story and control wins; when none does the call fails with
//! [`ProbeError::ControlNotFound`].

mod strategy;
mod value;

pub use strategy::{ApiStrategy, ArgMap, Lookup, SyncStrategy, UiStrategy};
pub use value::{ControlValue, UiInput};

use tracing::{info, warn};

use crate::result::{ProbeError, ProbeResult};
use crate::story::{NavigateOptions, StoryId, ViewMode};
use crate::target::RenderTargetClient;

/// Control name reported when a whole-story read finds nothing
pub const ALL_CONTROLS: &str = "*";

/// Reads and writes story args with strategy fallback
#[derive(Debug)]
pub struct ControlSynchronizer {
    client: RenderTargetClient,
    strategies: Vec<Box<dyn SyncStrategy>>,
}

impl ControlSynchronizer {
    /// Story-store API first, controls panel second
    #[must_use]
    pub fn new(client: RenderTargetClient) -> Self {
        let strategies: Vec<Box<dyn SyncStrategy>> = vec![
            Box::new(ApiStrategy::new(client.clone())),
            Box::new(UiStrategy::new(client.clone())),
        ];
        Self::with_strategies(client, strategies)
    }

    /// Custom strategy list, tried in order
    #[must_use]
    pub fn with_strategies(client: RenderTargetClient, strategies: Vec<Box<dyn SyncStrategy>>) -> Self {
        Self { client, strategies }
    }

    /// Strategy names in priority order
    #[must_use]
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    fn not_found(id: &StoryId, control: &str) -> ProbeError {
        warn!(story = %id, control, "no strategy found the control");
        ProbeError::ControlNotFound {
            control: control.to_string(),
            story: id.to_string(),
        }
    }

    /// Set one control. Returns once the new value reads back.
    pub async fn set_control(
        &self,
        id: &StoryId,
        name: &str,
        value: impl Into<ControlValue>,
    ) -> ProbeResult<()> {
        let value = value.into();
        self.client.ensure_loaded(id).await?;
        for strategy in &self.strategies {
            match strategy.try_set(id, name, &value).await? {
                Lookup::Found(()) => {
                    info!(story = %id, control = name, %value, strategy = strategy.name(), "control set");
                    return Ok(());
                }
                Lookup::NotFound => {
                    warn!(story = %id, control = name, strategy = strategy.name(), "control not reachable, trying next strategy");
                }
            }
        }
        Err(Self::not_found(id, name))
    }

    /// Set several controls. A strategy with a batch path takes them all at
    /// once, otherwise each control goes through [`Self::set_control`].
    pub async fn set_controls(&self, id: &StoryId, values: &ArgMap) -> ProbeResult<()> {
        if values.is_empty() {
            return Ok(());
        }
        self.client.ensure_loaded(id).await?;
        for strategy in &self.strategies {
            if let Lookup::Found(()) = strategy.try_set_many(id, values).await? {
                info!(story = %id, count = values.len(), strategy = strategy.name(), "controls set");
                return Ok(());
            }
        }
        for (name, value) in values {
            self.set_control(id, name, value.clone()).await?;
        }
        Ok(())
    }

    /// Read one control
    pub async fn get_control(&self, id: &StoryId, name: &str) -> ProbeResult<ControlValue> {
        self.client.ensure_loaded(id).await?;
        for strategy in &self.strategies {
            if let Lookup::Found(value) = strategy.try_get(id, name).await? {
                return Ok(value);
            }
        }
        Err(Self::not_found(id, name))
    }

    /// Read every control
    pub async fn get_all_controls(&self, id: &StoryId) -> ProbeResult<ArgMap> {
        self.client.ensure_loaded(id).await?;
        for strategy in &self.strategies {
            if let Lookup::Found(values) = strategy.try_get_all(id).await? {
                return Ok(values);
            }
        }
        Err(Self::not_found(id, ALL_CONTROLS))
    }

    /// Discard every change by reloading the story fresh, in the view mode it
    /// was last shown in
    pub async fn reset_to_defaults(&self, id: &StoryId) -> ProbeResult<()> {
        let mode = self
            .client
            .current()
            .await
            .filter(|l| &l.story == id)
            .map_or(ViewMode::Iframe, |l| l.mode);
        let mut options = NavigateOptions::new();
        if mode == ViewMode::Full {
            options = options.with_controls_panel();
        }
        info!(story = %id, ?mode, "reset controls to defaults");
        self.client.navigate_with(id, mode, &options).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::ProbeConfig;
    use crate::driver::MockDriver;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    fn story() -> StoryId {
        StoryId::new("example-button--primary").unwrap()
    }

    /// In-memory strategy that knows a fixed set of controls
    #[derive(Debug, Clone, Default)]
    struct MemoryStrategy {
        known: Arc<Mutex<ArgMap>>,
        batch: bool,
    }

    impl MemoryStrategy {
        fn with(pairs: &[(&str, ControlValue)]) -> Self {
            let map = pairs.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect();
            Self {
                known: Arc::new(Mutex::new(map)),
                batch: false,
            }
        }
    }

    #[async_trait]
    impl SyncStrategy for MemoryStrategy {
        fn name(&self) -> &'static str {
            "memory"
        }

        async fn try_get(&self, _id: &StoryId, name: &str) -> ProbeResult<Lookup<ControlValue>> {
            Ok(self
                .known
                .lock()
                .unwrap()
                .get(name)
                .cloned()
                .map_or(Lookup::NotFound, Lookup::Found))
        }

        async fn try_get_all(&self, _id: &StoryId) -> ProbeResult<Lookup<ArgMap>> {
            let known = self.known.lock().unwrap();
            Ok(if known.is_empty() {
                Lookup::NotFound
            } else {
                Lookup::Found(known.clone())
            })
        }

        async fn try_set(
            &self,
            _id: &StoryId,
            name: &str,
            value: &ControlValue,
        ) -> ProbeResult<Lookup<()>> {
            let mut known = self.known.lock().unwrap();
            match known.get_mut(name) {
                Some(slot) => {
                    *slot = value.clone();
                    Ok(Lookup::Found(()))
                }
                None => Ok(Lookup::NotFound),
            }
        }

        async fn try_set_many(&self, _id: &StoryId, values: &ArgMap) -> ProbeResult<Lookup<()>> {
            if !self.batch {
                return Ok(Lookup::NotFound);
            }
            let mut known = self.known.lock().unwrap();
            if values.keys().any(|k| !known.contains_key(k)) {
                return Ok(Lookup::NotFound);
            }
            known.extend(values.clone());
            Ok(Lookup::Found(()))
        }
    }

    fn synchronizer(strategies: Vec<Box<dyn SyncStrategy>>) -> (ControlSynchronizer, MockDriver) {
        let driver = MockDriver::new();
        let client = RenderTargetClient::new(driver.clone(), ProbeConfig::default().with_timeout_ms(300));
        (ControlSynchronizer::with_strategies(client, strategies), driver)
    }

    mod priority_tests {
        use super::*;

        #[test]
        fn test_default_order() {
            let client = RenderTargetClient::new(MockDriver::new(), ProbeConfig::default());
            assert_eq!(ControlSynchronizer::new(client).strategy_names(), vec!["api", "ui"]);
        }

        #[tokio::test]
        async fn test_first_strategy_wins() {
            let first = MemoryStrategy::with(&[("label", ControlValue::from("api"))]);
            let second = MemoryStrategy::with(&[("label", ControlValue::from("ui"))]);
            let (sync, _) = synchronizer(vec![Box::new(first), Box::new(second)]);
            assert_eq!(
                sync.get_control(&story(), "label").await.unwrap(),
                ControlValue::from("api")
            );
        }

        #[tokio::test]
        async fn test_falls_back_when_not_found() {
            let first = MemoryStrategy::default();
            let second = MemoryStrategy::with(&[("size", ControlValue::from("small"))]);
            let observer = second.clone();
            let (sync, _) = synchronizer(vec![Box::new(first), Box::new(second)]);
            sync.set_control(&story(), "size", "large").await.unwrap();
            assert_eq!(observer.known.lock().unwrap()["size"], ControlValue::from("large"));
        }

        #[tokio::test]
        async fn test_control_not_found() {
            let (sync, _) = synchronizer(vec![Box::new(MemoryStrategy::default())]);
            let err = sync.get_control(&story(), "ghost").await.unwrap_err();
            assert!(matches!(
                err,
                ProbeError::ControlNotFound { ref control, ref story } if control == "ghost" && story == "example-button--primary"
            ));
            let err = sync.get_all_controls(&story()).await.unwrap_err();
            assert!(matches!(err, ProbeError::ControlNotFound { ref control, .. } if control == ALL_CONTROLS));
        }
    }

    mod sync_tests {
        use super::*;

        #[tokio::test]
        async fn test_read_after_write() {
            let memory = MemoryStrategy::with(&[("items", ControlValue::Null)]);
            let (sync, _) = synchronizer(vec![Box::new(memory)]);
            let value = ControlValue::from(serde_json::json!({"b": [1, 2], "a": {"c": true}}));
            sync.set_control(&story(), "items", value.clone()).await.unwrap();
            assert_eq!(sync.get_control(&story(), "items").await.unwrap(), value);
        }

        #[tokio::test]
        async fn test_set_controls_batch_and_fallback() {
            let batch = MemoryStrategy {
                batch: true,
                ..MemoryStrategy::with(&[("a", ControlValue::from(1)), ("b", ControlValue::from(2))])
            };
            let observer = batch.clone();
            let (sync, _) = synchronizer(vec![Box::new(batch)]);
            let mut values = ArgMap::new();
            values.insert("a".into(), ControlValue::from(10));
            values.insert("b".into(), ControlValue::from(20));
            sync.set_controls(&story(), &values).await.unwrap();
            assert_eq!(*observer.known.lock().unwrap(), values);

            let single = MemoryStrategy::with(&[("a", ControlValue::from(1))]);
            let (sync, _) = synchronizer(vec![Box::new(single)]);
            let err = sync.set_controls(&story(), &values).await.unwrap_err();
            assert!(matches!(err, ProbeError::ControlNotFound { ref control, .. } if control == "b"));
        }

        #[tokio::test]
        async fn test_loads_story_once() {
            let memory = MemoryStrategy::with(&[("label", ControlValue::from("x"))]);
            let (sync, driver) = synchronizer(vec![Box::new(memory)]);
            sync.get_control(&story(), "label").await.unwrap();
            sync.get_control(&story(), "label").await.unwrap();
            assert_eq!(driver.navigations().len(), 1);
        }

        #[tokio::test]
        async fn test_reset_renavigates_in_last_mode() {
            let (sync, driver) = synchronizer(vec![Box::new(MemoryStrategy::default())]);
            sync.client.navigate(&story(), ViewMode::Full).await.unwrap();
            sync.reset_to_defaults(&story()).await.unwrap();
            let navigations = driver.navigations();
            assert_eq!(navigations.len(), 2);
            assert!(navigations[1].contains("?path=/story/example-button--primary"));
            assert!(navigations[1].contains("addonPanel"));

            let other = StoryId::new("example-button--secondary").unwrap();
            sync.reset_to_defaults(&other).await.unwrap();
            assert!(driver.navigations()[2].contains("iframe.html?id=example-button--secondary"));
        }
    }
}
