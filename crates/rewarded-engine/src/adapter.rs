use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::trace;
use uuid::Uuid;

use crate::engine::Command;
use crate::error::{AdErrorKind, AdapterError};
use crate::reward::Reward;
use crate::settings::SettingsSnapshot;
use crate::surface::SurfaceHandle;
use crate::types::{AdapterKind, NetworkId, NetworkKey, UnitId};

pub type BindingId = u64;

/// Server-supplied key/value configuration for the adapter.
pub type ServerParams = BTreeMap<String, String>;

/// Everything the engine knows about the unit being loaded.
#[derive(Debug, Clone)]
pub struct LocalParams {
    pub unit_id: UnitId,
    pub currency_name: Option<String>,
    pub currency_amount: Option<String>,
    pub correlation: Uuid,
    pub customer_id: Option<String>,
    pub settings: SettingsSnapshot,
}

/// Handed to [`RewardedAdapter::load_content`].
pub struct AdapterContext {
    pub surface: SurfaceHandle,
    pub events: AdapterEvents,
}

/// A third-party backed content source for one network.
///
/// Methods are called from the engine worker. Events flow back through the
/// [`AdapterEvents`] sink, which may be used from any thread.
pub trait RewardedAdapter: Send {
    fn load_content(
        &mut self,
        ctx: AdapterContext,
        local: LocalParams,
        server: &ServerParams,
    ) -> Result<(), AdapterError>;

    /// Network identifier for the content being loaded. Read after `load_content`.
    fn network_id(&self) -> NetworkId;

    fn has_content_available(&self) -> bool;

    fn present(&mut self);

    /// The binding is being replaced or abandoned; stop emitting events.
    fn dispose(&mut self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterSignal {
    LoadSucceeded,
    LoadFailed(AdErrorKind),
    Started,
    Clicked,
    PlaybackFailed(AdErrorKind),
    Closed,
    Completed(Reward),
}

impl AdapterSignal {
    pub fn name(&self) -> &'static str {
        match self {
            AdapterSignal::LoadSucceeded => "load_succeeded",
            AdapterSignal::LoadFailed(_) => "load_failed",
            AdapterSignal::Started => "started",
            AdapterSignal::Clicked => "clicked",
            AdapterSignal::PlaybackFailed(_) => "playback_failed",
            AdapterSignal::Closed => "closed",
            AdapterSignal::Completed(_) => "completed",
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct AdapterEvent {
    pub key: NetworkKey,
    pub binding: BindingId,
    pub signal: AdapterSignal,
}

/// Event sink for one adapter binding. Cheap to clone and `Send + Sync`.
#[derive(Clone)]
pub struct AdapterEvents {
    kind: AdapterKind,
    binding: BindingId,
    tx: mpsc::UnboundedSender<Command>,
}

impl AdapterEvents {
    pub(crate) fn new(
        kind: AdapterKind,
        binding: BindingId,
        tx: mpsc::UnboundedSender<Command>,
    ) -> Self {
        Self { kind, binding, tx }
    }

    pub fn kind(&self) -> &AdapterKind {
        &self.kind
    }

    pub fn binding_id(&self) -> BindingId {
        self.binding
    }

    pub fn load_succeeded(&self, network_id: &str) {
        self.emit(network_id, AdapterSignal::LoadSucceeded);
    }

    pub fn load_failed(&self, network_id: &str, error: AdErrorKind) {
        self.emit(network_id, AdapterSignal::LoadFailed(error));
    }

    pub fn started(&self, network_id: &str) {
        self.emit(network_id, AdapterSignal::Started);
    }

    pub fn clicked(&self, network_id: &str) {
        self.emit(network_id, AdapterSignal::Clicked);
    }

    pub fn playback_failed(&self, network_id: &str, error: AdErrorKind) {
        self.emit(network_id, AdapterSignal::PlaybackFailed(error));
    }

    pub fn closed(&self, network_id: &str) {
        self.emit(network_id, AdapterSignal::Closed);
    }

    pub fn completed(&self, network_id: &str, reward: Reward) {
        self.emit(network_id, AdapterSignal::Completed(reward));
    }

    fn emit(&self, network_id: &str, signal: AdapterSignal) {
        let event = AdapterEvent {
            key: NetworkKey::new(self.kind.clone(), network_id),
            binding: self.binding,
            signal,
        };
        if self.tx.send(Command::Adapter(event)).is_err() {
            trace!(
                target = "rewarded.router",
                kind = %self.kind,
                binding = self.binding,
                "engine stopped; dropping adapter event"
            );
        }
    }
}

impl std::fmt::Debug for AdapterEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterEvents")
            .field("kind", &self.kind)
            .field("binding", &self.binding)
            .finish()
    }
}

pub type AdapterFactory =
    Arc<dyn Fn() -> Result<Box<dyn RewardedAdapter>, AdapterError> + Send + Sync>;

/// Factory table mapping adapter-kind names to constructors.
#[derive(Clone, Default)]
pub struct AdapterCatalog {
    factories: HashMap<AdapterKind, AdapterFactory>,
}

impl AdapterCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, kind: impl Into<AdapterKind>, factory: F)
    where
        F: Fn() -> Result<Box<dyn RewardedAdapter>, AdapterError> + Send + Sync + 'static,
    {
        self.factories.insert(kind.into(), Arc::new(factory));
    }

    pub fn with<F>(mut self, kind: impl Into<AdapterKind>, factory: F) -> Self
    where
        F: Fn() -> Result<Box<dyn RewardedAdapter>, AdapterError> + Send + Sync + 'static,
    {
        self.register(kind, factory);
        self
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(&AdapterKind::new(kind))
    }

    /// Builds an adapter for `kind`. Panics inside the constructor are caught.
    pub fn instantiate(&self, kind: &str) -> Result<Box<dyn RewardedAdapter>, AdapterError> {
        let factory = self
            .factories
            .get(&AdapterKind::new(kind))
            .ok_or_else(|| AdapterError::UnknownKind(kind.to_string()))?;
        catch_adapter_panic(|| factory())?
    }
}

impl std::fmt::Debug for AdapterCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.factories.keys()).finish()
    }
}

/// Runs adapter code, turning a panic into [`AdapterError::Panicked`].
pub(crate) fn catch_adapter_panic<T>(f: impl FnOnce() -> T) -> Result<T, AdapterError> {
    panic::catch_unwind(AssertUnwindSafe(f))
        .map_err(|payload| AdapterError::Panicked(panic_message(payload.as_ref())))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
