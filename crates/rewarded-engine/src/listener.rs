use std::collections::BTreeSet;

use tokio::sync::mpsc;

use crate::error::AdErrorKind;
use crate::reward::Reward;
use crate::types::UnitId;

/// Receives unit lifecycle events. Every call is made from the engine worker, one
/// at a time, so implementations must return promptly.
pub trait RewardedListener: Send + Sync {
    fn on_load_success(&self, _unit: &str) {}
    fn on_load_failure(&self, _unit: &str, _error: AdErrorKind) {}
    fn on_started(&self, _unit: &str) {}
    fn on_clicked(&self, _unit: &str) {}
    fn on_playback_error(&self, _unit: &str, _error: AdErrorKind) {}
    fn on_closed(&self, _unit: &str) {}
    fn on_completed(&self, _units: &BTreeSet<UnitId>, _reward: &Reward) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerEvent {
    LoadSuccess(UnitId),
    LoadFailure(UnitId, AdErrorKind),
    Started(UnitId),
    Clicked(UnitId),
    PlaybackError(UnitId, AdErrorKind),
    Closed(UnitId),
    Completed(BTreeSet<UnitId>, Reward),
}

impl ListenerEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            ListenerEvent::LoadSuccess(_) => "load_success",
            ListenerEvent::LoadFailure(..) => "load_failure",
            ListenerEvent::Started(_) => "started",
            ListenerEvent::Clicked(_) => "clicked",
            ListenerEvent::PlaybackError(..) => "playback_error",
            ListenerEvent::Closed(_) => "closed",
            ListenerEvent::Completed(..) => "completed",
        }
    }
}

/// Forwards every callback as a [`ListenerEvent`] into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelListener {
    tx: mpsc::UnboundedSender<ListenerEvent>,
}

impl ChannelListener {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ListenerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn emit(&self, event: ListenerEvent) {
        let _ = self.tx.send(event);
    }
}

impl RewardedListener for ChannelListener {
    fn on_load_success(&self, unit: &str) {
        self.emit(ListenerEvent::LoadSuccess(unit.to_string()));
    }

    fn on_load_failure(&self, unit: &str, error: AdErrorKind) {
        self.emit(ListenerEvent::LoadFailure(unit.to_string(), error));
    }

    fn on_started(&self, unit: &str) {
        self.emit(ListenerEvent::Started(unit.to_string()));
    }

    fn on_clicked(&self, unit: &str) {
        self.emit(ListenerEvent::Clicked(unit.to_string()));
    }

    fn on_playback_error(&self, unit: &str, error: AdErrorKind) {
        self.emit(ListenerEvent::PlaybackError(unit.to_string(), error));
    }

    fn on_closed(&self, unit: &str) {
        self.emit(ListenerEvent::Closed(unit.to_string()));
    }

    fn on_completed(&self, units: &BTreeSet<UnitId>, reward: &Reward) {
        self.emit(ListenerEvent::Completed(units.clone(), reward.clone()));
    }
}
