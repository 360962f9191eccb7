//! The engine worker and the handle callers use to reach it.
//!
//! All state lives in one `EngineCore`, owned by a single task. Public calls,
//! transport responses, timer fires and adapter events are all [`Command`]s on
//! the same unbounded channel, so every state transition and listener callback
//! happens in arrival order on that task.

mod core;
mod orchestrator;
mod router;

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::adapter::{AdapterCatalog, AdapterEvent, BindingId};
use crate::config::EngineConfig;
use crate::endpoint::{DefaultEndpointBuilder, EndpointBuilder};
use crate::error::EngineError;
use crate::http::{HttpTracker, HttpTransport};
use crate::listener::RewardedListener;
use crate::settings::{MediationSettings, SettingsBag};
use crate::state::LoadStatus;
use crate::surface::DisplaySurfaceProvider;
use crate::timeout::TimerId;
use crate::tracking::TrackingSink;
use crate::transport::{AdTransport, TransportResult};
use crate::types::{NetworkKey, RequestParameters, UnitId};

use self::core::EngineCore;

pub(crate) enum Command {
    Load {
        unit: UnitId,
        params: RequestParameters,
        settings: SettingsBag,
    },
    Show {
        unit: UnitId,
    },
    HasContent {
        unit: UnitId,
        reply: oneshot::Sender<bool>,
    },
    SetListener(Option<Arc<dyn RewardedListener>>),
    GlobalSettings {
        reply: oneshot::Sender<SettingsBag>,
    },
    InstanceSettings {
        unit: UnitId,
        reply: oneshot::Sender<Option<SettingsBag>>,
    },
    Snapshot {
        unit: UnitId,
        reply: oneshot::Sender<UnitSnapshot>,
    },
    Response {
        unit: UnitId,
        request: u64,
        result: TransportResult,
    },
    TimeoutFired {
        unit: UnitId,
        timer: TimerId,
    },
    Adapter(AdapterEvent),
    Shutdown(oneshot::Sender<()>),
}

/// Point-in-time view of one unit, for diagnostics and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitSnapshot {
    pub status: LoadStatus,
    pub binding: Option<(BindingId, NetworkKey)>,
    pub timer_armed: bool,
    pub displaying: bool,
}

pub struct EngineBuilder {
    config: EngineConfig,
    surface: Arc<dyn DisplaySurfaceProvider>,
    catalog: AdapterCatalog,
    transport: Option<Arc<dyn AdTransport>>,
    endpoints: Option<Arc<dyn EndpointBuilder>>,
    tracker: Option<Arc<dyn TrackingSink>>,
    listener: Option<Arc<dyn RewardedListener>>,
    global_settings: SettingsBag,
}

impl EngineBuilder {
    pub fn new(config: EngineConfig, surface: Arc<dyn DisplaySurfaceProvider>) -> Self {
        Self {
            config,
            surface,
            catalog: AdapterCatalog::new(),
            transport: None,
            endpoints: None,
            tracker: None,
            listener: None,
            global_settings: SettingsBag::new(),
        }
    }

    pub fn adapters(mut self, catalog: AdapterCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn transport(mut self, transport: Arc<dyn AdTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn endpoints(mut self, endpoints: Arc<dyn EndpointBuilder>) -> Self {
        self.endpoints = Some(endpoints);
        self
    }

    pub fn tracker(mut self, tracker: Arc<dyn TrackingSink>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn listener(mut self, listener: Arc<dyn RewardedListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn global_settings(mut self, settings: SettingsBag) -> Self {
        self.global_settings = settings;
        self
    }

    /// Starts the worker on the current Tokio runtime.
    pub fn spawn(self) -> Result<Engine, EngineError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| EngineError::NoRuntime)?;
        let endpoints = match self.endpoints {
            Some(endpoints) => endpoints,
            None => Arc::new(DefaultEndpointBuilder::new(&self.config.ad_host)?),
        };
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(HttpTransport::new()));
        let tracker = self.tracker.unwrap_or_else(|| Arc::new(HttpTracker::new()));

        let (tx, rx) = mpsc::unbounded_channel();
        let correlation = Uuid::new_v4();
        let core = EngineCore::new(
            tx.clone(),
            correlation,
            self.config.default_load_timeout,
            core::Collaborators {
                transport,
                endpoints,
                catalog: self.catalog,
                surface: self.surface,
                tracker,
            },
            self.listener,
            self.global_settings,
        );
        let worker = runtime.spawn(run(core, rx));
        debug!(
            target = "rewarded.orchestrator",
            correlation = %correlation,
            default_timeout_ms = self.config.default_load_timeout.as_millis() as u64,
            "rewarded engine started"
        );
        Ok(Engine {
            handle: EngineHandle { tx, correlation },
            worker,
        })
    }
}

async fn run(mut core: EngineCore, mut rx: mpsc::UnboundedReceiver<Command>) {
    while let Some(command) = rx.recv().await {
        match command {
            Command::Shutdown(ack) => {
                core.teardown();
                let _ = ack.send(());
                break;
            }
            other => core.handle(other),
        }
    }
}

/// A running engine. Dropping it leaves the worker running until [`Engine::shutdown`].
pub struct Engine {
    handle: EngineHandle,
    worker: JoinHandle<()>,
}

impl Engine {
    pub fn handle(&self) -> EngineHandle {
        self.handle.clone()
    }

    /// Stops the worker after it disposes every adapter and cancels every timer.
    pub async fn shutdown(self) -> Result<(), EngineError> {
        let (ack, done) = oneshot::channel();
        self.handle.send(Command::Shutdown(ack))?;
        let _ = done.await;
        if let Err(err) = self.worker.await {
            warn!(target = "rewarded.orchestrator", error = %err, "engine worker ended abnormally");
        }
        Ok(())
    }
}

/// Cloneable entry point into the engine worker. Calls never block.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::UnboundedSender<Command>,
    correlation: Uuid,
}

impl EngineHandle {
    /// Identifier sent with every request and handed to adapters.
    pub fn correlation(&self) -> Uuid {
        self.correlation
    }

    /// Requests content for `unit`, replacing its mediation settings with `settings`.
    pub fn load(
        &self,
        unit: impl Into<UnitId>,
        params: RequestParameters,
        settings: SettingsBag,
    ) -> Result<(), EngineError> {
        self.send(Command::Load {
            unit: unit.into(),
            params,
            settings,
        })
    }

    pub fn show(&self, unit: impl Into<UnitId>) -> Result<(), EngineError> {
        self.send(Command::Show { unit: unit.into() })
    }

    pub fn set_listener(
        &self,
        listener: Option<Arc<dyn RewardedListener>>,
    ) -> Result<(), EngineError> {
        self.send(Command::SetListener(listener))
    }

    pub async fn has_content(&self, unit: impl Into<UnitId>) -> Result<bool, EngineError> {
        let unit = unit.into();
        self.request(|reply| Command::HasContent { unit, reply }).await
    }

    pub async fn global_settings<T: MediationSettings>(
        &self,
    ) -> Result<Option<Arc<T>>, EngineError> {
        let bag = self
            .request(|reply| Command::GlobalSettings { reply })
            .await?;
        Ok(bag.get::<T>())
    }

    pub async fn instance_settings<T: MediationSettings>(
        &self,
        unit: impl Into<UnitId>,
    ) -> Result<Option<Arc<T>>, EngineError> {
        let unit = unit.into();
        let bag = self
            .request(|reply| Command::InstanceSettings { unit, reply })
            .await?;
        Ok(bag.and_then(|bag| bag.get::<T>()))
    }

    pub async fn snapshot(&self, unit: impl Into<UnitId>) -> Result<UnitSnapshot, EngineError> {
        let unit = unit.into();
        self.request(|reply| Command::Snapshot { unit, reply }).await
    }

    fn send(&self, command: Command) -> Result<(), EngineError> {
        self.tx.send(command).map_err(|_| EngineError::Closed)
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.send(build(reply))?;
        rx.await.map_err(|_| EngineError::Closed)
    }
}
