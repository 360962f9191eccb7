use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::adapter::{catch_adapter_panic, AdapterCatalog, BindingId, RewardedAdapter};
use crate::endpoint::EndpointBuilder;
use crate::listener::RewardedListener;
use crate::metrics;
use crate::registry::BindingRegistry;
use crate::reward::RewardBook;
use crate::settings::{SettingsBag, SettingsStore};
use crate::state::UnitStateStore;
use crate::surface::DisplaySurfaceProvider;
use crate::timeout::TimeoutRegistry;
use crate::tracking::TrackingSink;
use crate::transport::AdTransport;
use crate::types::UnitId;

use super::{Command, UnitSnapshot};

pub(super) struct Collaborators {
    pub transport: Arc<dyn AdTransport>,
    pub endpoints: Arc<dyn EndpointBuilder>,
    pub catalog: AdapterCatalog,
    pub surface: Arc<dyn DisplaySurfaceProvider>,
    pub tracker: Arc<dyn TrackingSink>,
}

/// State owned by the engine worker.
pub(super) struct EngineCore {
    pub(super) tx: mpsc::UnboundedSender<Command>,
    pub(super) correlation: Uuid,
    pub(super) default_timeout: Duration,
    pub(super) io: Collaborators,
    pub(super) listener: Option<Arc<dyn RewardedListener>>,
    pub(super) units: UnitStateStore,
    pub(super) registry: BindingRegistry,
    pub(super) timeouts: TimeoutRegistry,
    pub(super) rewards: RewardBook,
    pub(super) settings: SettingsStore,
    pub(super) customer_id: Option<String>,
    /// Sequence of the request each loading unit is waiting on.
    pub(super) in_flight: HashMap<UnitId, u64>,
    next_request: u64,
    next_binding: BindingId,
}

impl EngineCore {
    pub(super) fn new(
        tx: mpsc::UnboundedSender<Command>,
        correlation: Uuid,
        default_timeout: Duration,
        io: Collaborators,
        listener: Option<Arc<dyn RewardedListener>>,
        global_settings: SettingsBag,
    ) -> Self {
        Self {
            tx,
            correlation,
            default_timeout,
            io,
            listener,
            units: UnitStateStore::new(),
            registry: BindingRegistry::new(),
            timeouts: TimeoutRegistry::new(),
            rewards: RewardBook::new(),
            settings: SettingsStore::new(global_settings),
            customer_id: None,
            in_flight: HashMap::new(),
            next_request: 0,
            next_binding: 0,
        }
    }

    pub(super) fn handle(&mut self, command: Command) {
        match command {
            Command::Load {
                unit,
                params,
                settings,
            } => self.load(unit, params, settings),
            Command::Show { unit } => self.show(&unit),
            Command::HasContent { unit, reply } => {
                let _ = reply.send(self.has_playable_content(&unit));
            }
            Command::SetListener(listener) => {
                debug!(
                    target = "rewarded.orchestrator",
                    present = listener.is_some(),
                    "listener replaced"
                );
                self.listener = listener;
            }
            Command::GlobalSettings { reply } => {
                let _ = reply.send(self.settings.global().clone());
            }
            Command::InstanceSettings { unit, reply } => {
                let _ = reply.send(self.settings.instance(&unit).cloned());
            }
            Command::Snapshot { unit, reply } => {
                let _ = reply.send(self.snapshot(&unit));
            }
            Command::Response {
                unit,
                request,
                result,
            } => self.on_response(unit, request, result),
            Command::TimeoutFired { unit, timer } => self.on_timeout(&unit, timer),
            Command::Adapter(event) => self.on_adapter_event(event),
            // The run loop intercepts shutdown before dispatch.
            Command::Shutdown(ack) => {
                let _ = ack.send(());
            }
        }
    }

    pub(super) fn next_request_id(&mut self) -> u64 {
        self.next_request += 1;
        self.next_request
    }

    pub(super) fn next_binding_id(&mut self) -> BindingId {
        self.next_binding += 1;
        self.next_binding
    }

    /// Invokes the listener, if any, and counts the event.
    pub(super) fn notify(&self, event: &'static str, call: impl FnOnce(&dyn RewardedListener)) {
        metrics::LISTENER_EVENTS.with_label_values(&[event]).inc();
        match &self.listener {
            Some(listener) => call(listener.as_ref()),
            None => debug!(
                target = "rewarded.router",
                event,
                "no listener set; dropping event"
            ),
        }
    }

    pub(super) fn snapshot(&self, unit: &str) -> UnitSnapshot {
        UnitSnapshot {
            status: self.units.status(unit),
            binding: self
                .registry
                .get(unit)
                .map(|binding| (binding.id, binding.key.clone())),
            timer_armed: self.timeouts.is_armed(unit),
            displaying: self.registry.displaying() == Some(unit),
        }
    }

    pub(super) fn teardown(&mut self) {
        self.timeouts.cancel_all();
        let bindings = self.registry.drain();
        let disposed = bindings.len();
        for (unit, mut binding) in bindings {
            dispose_adapter(&unit, binding.adapter.as_mut());
        }
        self.in_flight.clear();
        info!(
            target = "rewarded.orchestrator",
            disposed,
            "rewarded engine stopped"
        );
    }
}

pub(super) fn dispose_adapter(unit: &str, adapter: &mut dyn RewardedAdapter) {
    if let Err(err) = catch_adapter_panic(|| adapter.dispose()) {
        warn!(
            target = "rewarded.orchestrator",
            unit_id = unit,
            error = %err,
            "adapter dispose panicked"
        );
    }
}
