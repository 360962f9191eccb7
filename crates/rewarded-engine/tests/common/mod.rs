#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rewarded_engine::{
    AdErrorKind, AdResponse, AdapterCatalog, AdapterContext, AdapterError, AdapterEvents,
    ChannelListener, Engine, EngineBuilder, EngineConfig, EngineHandle, ListenerEvent,
    LoadStatus, LocalParams, NetworkId, RecordingTracker, RequestParameters, RewardedAdapter,
    ScriptedTransport, ServerParams, SettingsBag, Surface, SurfaceHandle, UnitSnapshot,
    WeakSurface,
};
use tokio::sync::mpsc;

pub const HOST: &str = "https://ads.test";

pub fn endpoint(unit: &str) -> String {
    format!("{HOST}/{unit}")
}

pub fn fill(kind: &str) -> AdResponse {
    AdResponse::for_adapter(kind)
}

/// What a scripted adapter does when asked to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadBehavior {
    Succeed,
    Fail(AdErrorKind),
    Silent,
    Reject,
    Panic,
}

#[derive(Debug, Default)]
pub struct Probe {
    pub events: Option<AdapterEvents>,
    pub local: Option<LocalParams>,
    pub server: ServerParams,
    pub available: bool,
    pub presented: u32,
    pub disposed: bool,
}

struct ScriptedAdapter {
    network_id: NetworkId,
    behavior: LoadBehavior,
    probe: Arc<Mutex<Probe>>,
}

impl RewardedAdapter for ScriptedAdapter {
    fn load_content(
        &mut self,
        ctx: AdapterContext,
        local: LocalParams,
        server: &ServerParams,
    ) -> Result<(), AdapterError> {
        {
            let mut probe = self.probe.lock();
            probe.events = Some(ctx.events.clone());
            probe.local = Some(local);
            probe.server = server.clone();
        }
        match self.behavior {
            LoadBehavior::Succeed => {
                self.probe.lock().available = true;
                ctx.events.load_succeeded(&self.network_id);
                Ok(())
            }
            LoadBehavior::Fail(kind) => {
                ctx.events.load_failed(&self.network_id, kind);
                Ok(())
            }
            LoadBehavior::Silent => Ok(()),
            LoadBehavior::Reject => Err(AdapterError::Load("sdk refused request".into())),
            LoadBehavior::Panic => panic!("sdk crashed during load"),
        }
    }

    fn network_id(&self) -> NetworkId {
        self.network_id.clone()
    }

    fn has_content_available(&self) -> bool {
        let probe = self.probe.lock();
        probe.available && !probe.disposed
    }

    fn present(&mut self) {
        self.probe.lock().presented += 1;
    }

    fn dispose(&mut self) {
        let mut probe = self.probe.lock();
        probe.disposed = true;
        probe.available = false;
    }
}

/// Builds scripted adapters for one kind and keeps a probe per instance.
#[derive(Clone)]
pub struct AdapterLab {
    network_id: NetworkId,
    behavior: Arc<Mutex<LoadBehavior>>,
    instances: Arc<Mutex<Vec<Arc<Mutex<Probe>>>>>,
}

impl AdapterLab {
    pub fn new(network_id: &str, behavior: LoadBehavior) -> Self {
        Self {
            network_id: network_id.to_string(),
            behavior: Arc::new(Mutex::new(behavior)),
            instances: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn set_behavior(&self, behavior: LoadBehavior) {
        *self.behavior.lock() = behavior;
    }

    pub fn register(&self, catalog: AdapterCatalog, kind: &str) -> AdapterCatalog {
        let lab = self.clone();
        catalog.with(kind, move || {
            let probe = Arc::new(Mutex::new(Probe::default()));
            lab.instances.lock().push(Arc::clone(&probe));
            Ok(Box::new(ScriptedAdapter {
                network_id: lab.network_id.clone(),
                behavior: *lab.behavior.lock(),
                probe,
            }) as Box<dyn RewardedAdapter>)
        })
    }

    pub fn instances(&self) -> usize {
        self.instances.lock().len()
    }

    pub fn probe(&self, index: usize) -> Arc<Mutex<Probe>> {
        Arc::clone(&self.instances.lock()[index])
    }

    pub fn events(&self, index: usize) -> AdapterEvents {
        self.probe(index)
            .lock()
            .events
            .clone()
            .expect("adapter was asked to load")
    }

    pub fn local(&self, index: usize) -> LocalParams {
        self.probe(index)
            .lock()
            .local
            .clone()
            .expect("adapter was asked to load")
    }

    pub fn disposed(&self, index: usize) -> bool {
        self.probe(index).lock().disposed
    }

    pub fn presented(&self, index: usize) -> u32 {
        self.probe(index).lock().presented
    }
}

pub struct Harness {
    engine: Option<Engine>,
    pub handle: EngineHandle,
    pub transport: Arc<ScriptedTransport>,
    pub tracker: Arc<RecordingTracker>,
    pub events: mpsc::UnboundedReceiver<ListenerEvent>,
    pub provider: Arc<WeakSurface>,
    surface: Option<SurfaceHandle>,
}

impl Harness {
    pub fn start(catalog: AdapterCatalog) -> Self {
        Self::start_with(catalog, EngineConfig::default(), SettingsBag::new())
    }

    pub fn start_with(catalog: AdapterCatalog, config: EngineConfig, global: SettingsBag) -> Self {
        let surface = Surface::new("test-host");
        let provider = Arc::new(WeakSurface::tracking(&surface));
        let transport = Arc::new(ScriptedTransport::new());
        let tracker = Arc::new(RecordingTracker::new());
        let (listener, events) = ChannelListener::new();
        let engine = EngineBuilder::new(config, provider.clone())
            .adapters(catalog)
            .transport(transport.clone())
            .tracker(tracker.clone())
            .endpoints(Arc::new(|unit: &str, _: &RequestParameters| endpoint(unit)))
            .listener(Arc::new(listener))
            .global_settings(global)
            .spawn()
            .expect("engine starts");
        Self {
            handle: engine.handle(),
            engine: Some(engine),
            transport,
            tracker,
            events,
            provider,
            surface: Some(surface),
        }
    }

    pub fn load(&self, unit: &str) {
        self.handle
            .load(unit, RequestParameters::default(), SettingsBag::new())
            .expect("engine accepts load");
    }

    pub fn show(&self, unit: &str) {
        self.handle.show(unit).expect("engine accepts show");
    }

    /// Drops the host so the weak provider has nothing to hand out.
    pub fn drop_surface(&mut self) {
        self.surface = None;
    }

    pub async fn next_event(&mut self) -> ListenerEvent {
        tokio::time::timeout(Duration::from_secs(120), self.events.recv())
            .await
            .expect("listener event before deadline")
            .expect("listener channel open")
    }

    /// Lets spawned transport calls and queued adapter events drain through the worker.
    pub async fn settle(&self) {
        for _ in 0..16 {
            tokio::task::yield_now().await;
            self.handle.snapshot("").await.expect("engine running");
        }
    }

    pub async fn assert_quiet(&mut self) {
        self.settle().await;
        if let Ok(event) = self.events.try_recv() {
            panic!("unexpected listener event: {event:?}");
        }
    }

    pub async fn snapshot(&self, unit: &str) -> UnitSnapshot {
        self.handle.snapshot(unit).await.expect("engine running")
    }

    pub async fn status(&self, unit: &str) -> LoadStatus {
        self.snapshot(unit).await.status
    }

    pub async fn shutdown(mut self) {
        if let Some(engine) = self.engine.take() {
            engine.shutdown().await.expect("engine stops");
        }
    }
}
