use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rewarded_engine::{
    AdResponse, ChannelListener, EngineBuilder, EngineHandle, ListenerEvent, RecordingTracker,
    RequestParameters, ScriptedTransport, SettingsBag, Surface, WeakSurface,
};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn};

use crate::adapters::{self, FLAKY, INSTANT};
use crate::config::{Backend, SimConfig};

const SCRIPTED_HOST: &str = "sim://ads";
const SHARED_NETWORK: &str = "sim-network-1";
/// Headroom on top of the load timeout before the simulator gives up on a unit.
const EVENT_GRACE: Duration = Duration::from_secs(5);

fn scripted_endpoint(unit: &str) -> String {
    format!("{SCRIPTED_HOST}/{unit}")
}

/// Every unit first hits a network with no fill, then fails over to one that
/// fills. All filling units share one network id so completions fan out.
fn scripted_transport(units: &[String]) -> ScriptedTransport {
    let transport = ScriptedTransport::new();
    for unit in units {
        let failover = format!("{SCRIPTED_HOST}/failover/{unit}");
        transport.respond_always(
            scripted_endpoint(unit),
            Ok(AdResponse {
                adapter_kind: Some(FLAKY.into()),
                failover_url: Some(failover.clone()),
                server_extras: BTreeMap::from([("network_id".into(), format!("flaky-{unit}"))]),
                ..AdResponse::default()
            }),
        );
        transport.respond_always(
            failover,
            Ok(AdResponse {
                adapter_kind: Some(INSTANT.into()),
                impression_tracking_url: Some(format!("{SCRIPTED_HOST}/imp/{unit}")),
                click_tracking_url: Some(format!("{SCRIPTED_HOST}/click/{unit}")),
                currency_name: Some("coins".into()),
                currency_amount: Some("25".into()),
                timeout_millis: Some(2_000),
                server_extras: BTreeMap::from([("network_id".into(), SHARED_NETWORK.into())]),
                ..AdResponse::default()
            }),
        );
    }
    transport
}

pub async fn run(cfg: SimConfig) -> Result<()> {
    let surface = Surface::new("sim-window");
    let (listener, mut events) = ChannelListener::new();
    let tracker = Arc::new(RecordingTracker::new());

    let mut builder = EngineBuilder::new(cfg.engine.clone(), Arc::new(WeakSurface::tracking(&surface)))
        .adapters(adapters::catalog())
        .listener(Arc::new(listener));
    if cfg.backend == Backend::Scripted {
        builder = builder
            .transport(Arc::new(scripted_transport(&cfg.units)))
            .endpoints(Arc::new(|unit: &str, _: &RequestParameters| {
                scripted_endpoint(unit)
            }))
            .tracker(tracker.clone());
    }
    let engine = builder.spawn().context("starting rewarded engine")?;
    let handle = engine.handle();
    info!(
        backend = ?cfg.backend,
        units = ?cfg.units,
        correlation = %handle.correlation(),
        "simulation starting"
    );

    let params = match &cfg.customer_id {
        Some(id) => RequestParameters::default().customer_id(id.clone()),
        None => RequestParameters::default(),
    };
    for unit in &cfg.units {
        handle.load(unit.as_str(), params.clone(), SettingsBag::new())?;
    }

    let wait = cfg.engine.default_load_timeout + EVENT_GRACE;
    let loaded = await_loads(&mut events, &cfg.units, wait).await;
    for unit in cfg.units.iter().filter(|unit| loaded.contains(*unit)) {
        play(&handle, &mut events, unit, wait).await?;
    }

    if cfg.backend == Backend::Scripted {
        for call in tracker.calls() {
            info!(call = ?call, "tracking call");
        }
    }
    engine.shutdown().await?;
    info!(loaded = loaded.len(), requested = cfg.units.len(), "simulation finished");
    Ok(())
}

/// Waits until every unit has succeeded or failed, returning those that loaded.
async fn await_loads(
    events: &mut UnboundedReceiver<ListenerEvent>,
    units: &[String],
    wait: Duration,
) -> BTreeSet<String> {
    let mut pending: BTreeSet<String> = units.iter().cloned().collect();
    let mut loaded = BTreeSet::new();
    while !pending.is_empty() {
        let Some(event) = next_event(events, wait).await else {
            warn!(pending = ?pending, "gave up waiting for loads");
            break;
        };
        match event {
            ListenerEvent::LoadSuccess(unit) => {
                pending.remove(&unit);
                loaded.insert(unit);
            }
            ListenerEvent::LoadFailure(unit, _) => {
                pending.remove(&unit);
                loaded.remove(&unit);
            }
            _ => {}
        }
    }
    loaded
}

async fn play(
    handle: &EngineHandle,
    events: &mut UnboundedReceiver<ListenerEvent>,
    unit: &str,
    wait: Duration,
) -> Result<()> {
    if !handle.has_content(unit).await? {
        warn!(unit_id = unit, "nothing to play");
        return Ok(());
    }
    handle.show(unit)?;
    while let Some(event) = next_event(events, wait).await {
        match event {
            ListenerEvent::Closed(closed) if closed == unit => return Ok(()),
            ListenerEvent::PlaybackError(failed, _) if failed == unit => return Ok(()),
            ListenerEvent::LoadFailure(failed, _) if failed == unit => return Ok(()),
            _ => {}
        }
    }
    warn!(unit_id = unit, "playback never finished");
    Ok(())
}

async fn next_event(
    events: &mut UnboundedReceiver<ListenerEvent>,
    wait: Duration,
) -> Option<ListenerEvent> {
    let event = tokio::time::timeout(wait, events.recv()).await.ok().flatten()?;
    match &event {
        ListenerEvent::Completed(units, reward) => info!(
            units = ?units,
            successful = reward.is_successful(),
            label = reward.label(),
            amount = reward.amount(),
            "listener: completed"
        ),
        ListenerEvent::LoadFailure(unit, error) | ListenerEvent::PlaybackError(unit, error) => {
            info!(unit_id = %unit, error = %error, "listener: {}", event.kind())
        }
        ListenerEvent::LoadSuccess(unit)
        | ListenerEvent::Started(unit)
        | ListenerEvent::Clicked(unit)
        | ListenerEvent::Closed(unit) => info!(unit_id = %unit, "listener: {}", event.kind()),
    }
    Some(event)
}
