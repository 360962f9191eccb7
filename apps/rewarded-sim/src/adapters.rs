//! Stand-in networks for the simulator. They behave like SDK-backed adapters:
//! loading and playback finish on background tasks and report through the
//! engine's event sink.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rewarded_engine::{
    AdErrorKind, AdapterCatalog, AdapterContext, AdapterError, AdapterEvents, LocalParams,
    NetworkId, Reward, RewardedAdapter, ServerParams,
};
use tokio::task::JoinHandle;
use tracing::debug;

pub const INSTANT: &str = "instant";
pub const FLAKY: &str = "flaky";

const LOAD_DELAY: Duration = Duration::from_millis(150);
const PLAYBACK_LENGTH: Duration = Duration::from_millis(400);

pub fn catalog() -> AdapterCatalog {
    AdapterCatalog::new()
        .with(INSTANT, || {
            Ok(Box::new(SimulatedNetwork::new(Outcome::Fill)) as Box<dyn RewardedAdapter>)
        })
        .with(FLAKY, || {
            Ok(Box::new(SimulatedNetwork::new(Outcome::NoFill)) as Box<dyn RewardedAdapter>)
        })
}

#[derive(Debug, Clone, Copy)]
enum Outcome {
    Fill,
    NoFill,
}

struct SimulatedNetwork {
    outcome: Outcome,
    network_id: NetworkId,
    events: Option<AdapterEvents>,
    ready: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl SimulatedNetwork {
    fn new(outcome: Outcome) -> Self {
        Self {
            outcome,
            network_id: String::new(),
            events: None,
            ready: Arc::new(AtomicBool::new(false)),
            task: None,
        }
    }
}

impl RewardedAdapter for SimulatedNetwork {
    fn load_content(
        &mut self,
        ctx: AdapterContext,
        local: LocalParams,
        server: &ServerParams,
    ) -> Result<(), AdapterError> {
        self.network_id = server
            .get("network_id")
            .cloned()
            .unwrap_or_else(|| "sim-default".to_string());
        debug!(
            unit_id = %local.unit_id,
            network_id = %self.network_id,
            surface = %ctx.surface.name,
            "simulated network loading"
        );

        let events = ctx.events.clone();
        let network_id = self.network_id.clone();
        let ready = Arc::clone(&self.ready);
        let outcome = self.outcome;
        self.events = Some(ctx.events);
        self.task = Some(tokio::spawn(async move {
            tokio::time::sleep(LOAD_DELAY).await;
            match outcome {
                Outcome::Fill => {
                    ready.store(true, Ordering::SeqCst);
                    events.load_succeeded(&network_id);
                }
                Outcome::NoFill => events.load_failed(&network_id, AdErrorKind::NoFill),
            }
        }));
        Ok(())
    }

    fn network_id(&self) -> NetworkId {
        self.network_id.clone()
    }

    fn has_content_available(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn present(&mut self) {
        let Some(events) = self.events.clone() else {
            return;
        };
        self.ready.store(false, Ordering::SeqCst);
        let network_id = self.network_id.clone();
        self.task = Some(tokio::spawn(async move {
            events.started(&network_id);
            tokio::time::sleep(PLAYBACK_LENGTH).await;
            // SDKs commonly report generic terms; the engine substitutes the advertised ones.
            events.completed(&network_id, Reward::success("reward", 1));
            events.closed(&network_id);
        }));
    }

    fn dispose(&mut self) {
        self.ready.store(false, Ordering::SeqCst);
        self.events = None;
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
