use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{error, info};

use crate::engine::{Engine, EngineBuilder, EngineHandle, UnitSnapshot};
use crate::error::EngineError;
use crate::listener::RewardedListener;
use crate::settings::{MediationSettings, SettingsBag};
use crate::types::{RequestParameters, UnitId};

/// Application-facing entry point with an explicit init/teardown lifecycle.
///
/// Every call made before [`RewardedVideos::init`] or after
/// [`RewardedVideos::teardown`] returns [`EngineError::NotInitialized`].
#[derive(Default)]
pub struct RewardedVideos {
    engine: RwLock<Option<Engine>>,
}

impl RewardedVideos {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts the engine. A second call is refused and leaves the first engine running.
    pub fn init(&self, builder: EngineBuilder) -> Result<(), EngineError> {
        let mut slot = self.engine.write();
        if slot.is_some() {
            error!(
                target = "rewarded.orchestrator",
                "init called twice; keeping the running engine"
            );
            return Err(EngineError::AlreadyInitialized);
        }
        *slot = Some(builder.spawn()?);
        info!(target = "rewarded.orchestrator", "rewarded videos initialized");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.engine.read().is_some()
    }

    /// Stops the engine, disposing every adapter. Later calls fail until `init` runs again.
    pub async fn teardown(&self) -> Result<(), EngineError> {
        let engine = self.engine.write().take();
        match engine {
            Some(engine) => engine.shutdown().await,
            None => Err(self.not_initialized("teardown")),
        }
    }

    pub fn handle(&self) -> Result<EngineHandle, EngineError> {
        self.live("handle")
    }

    pub fn load(
        &self,
        unit: impl Into<UnitId>,
        params: RequestParameters,
        settings: SettingsBag,
    ) -> Result<(), EngineError> {
        self.live("load")?.load(unit, params, settings)
    }

    pub fn show(&self, unit: impl Into<UnitId>) -> Result<(), EngineError> {
        self.live("show")?.show(unit)
    }

    pub fn set_listener(
        &self,
        listener: Option<Arc<dyn RewardedListener>>,
    ) -> Result<(), EngineError> {
        self.live("set_listener")?.set_listener(listener)
    }

    pub async fn has_content(&self, unit: impl Into<UnitId>) -> Result<bool, EngineError> {
        self.live("has_content")?.has_content(unit).await
    }

    pub async fn global_settings<T: MediationSettings>(
        &self,
    ) -> Result<Option<Arc<T>>, EngineError> {
        self.live("global_settings")?.global_settings::<T>().await
    }

    pub async fn instance_settings<T: MediationSettings>(
        &self,
        unit: impl Into<UnitId>,
    ) -> Result<Option<Arc<T>>, EngineError> {
        self.live("instance_settings")?
            .instance_settings::<T>(unit)
            .await
    }

    pub async fn snapshot(&self, unit: impl Into<UnitId>) -> Result<UnitSnapshot, EngineError> {
        self.live("snapshot")?.snapshot(unit).await
    }

    fn live(&self, operation: &'static str) -> Result<EngineHandle, EngineError> {
        self.engine
            .read()
            .as_ref()
            .map(Engine::handle)
            .ok_or_else(|| self.not_initialized(operation))
    }

    fn not_initialized(&self, operation: &'static str) -> EngineError {
        error!(
            target = "rewarded.orchestrator",
            operation,
            "rewarded videos used before init"
        );
        EngineError::NotInitialized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::surface::WeakSurface;
    use crate::transport::ScriptedTransport;

    #[tokio::test]
    async fn calls_before_init_are_refused() {
        let videos = RewardedVideos::new();
        assert!(matches!(
            videos.load("u1", RequestParameters::default(), SettingsBag::new()),
            Err(EngineError::NotInitialized)
        ));
        assert!(matches!(videos.show("u1"), Err(EngineError::NotInitialized)));
        assert!(matches!(
            videos.has_content("u1").await,
            Err(EngineError::NotInitialized)
        ));
        assert!(matches!(
            videos.teardown().await,
            Err(EngineError::NotInitialized)
        ));
    }

    #[tokio::test]
    async fn second_init_is_refused_and_teardown_resets() {
        let builder = || {
            EngineBuilder::new(EngineConfig::default(), Arc::new(WeakSurface::new()))
                .transport(Arc::new(ScriptedTransport::new()))
        };
        let videos = RewardedVideos::new();
        videos.init(builder()).unwrap();
        assert!(matches!(
            videos.init(builder()),
            Err(EngineError::AlreadyInitialized)
        ));
        assert!(!videos.has_content("u1").await.unwrap());

        videos.teardown().await.unwrap();
        assert!(!videos.is_initialized());
        assert!(matches!(videos.show("u1"), Err(EngineError::NotInitialized)));
    }
}
