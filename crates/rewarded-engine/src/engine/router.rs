use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use crate::adapter::{AdapterEvent, AdapterSignal};
use crate::metrics;
use crate::reward::{choose_reward, Reward};
use crate::types::{NetworkKey, UnitId};

use super::core::EngineCore;

impl EngineCore {
    pub(super) fn on_adapter_event(&mut self, event: AdapterEvent) {
        if !self.registry.is_live(event.binding) {
            metrics::LATE_EVENTS.inc();
            debug!(
                target = "rewarded.router",
                network = %event.key,
                binding = event.binding,
                signal = event.signal.name(),
                "event from retired binding; ignoring"
            );
            return;
        }
        debug!(
            target = "rewarded.router",
            network = %event.key,
            binding = event.binding,
            signal = event.signal.name(),
            "adapter event"
        );

        let key = event.key;
        match event.signal {
            AdapterSignal::LoadSucceeded => {
                for unit in self.registry.fan_out(&key) {
                    self.timeouts.cancel(&unit);
                    self.notify("load_success", |l| l.on_load_success(&unit));
                }
            }
            AdapterSignal::LoadFailed(kind) => {
                for unit in self.registry.fan_out(&key) {
                    self.timeouts.cancel(&unit);
                    if self.registry.displaying() != Some(unit.as_str()) {
                        self.retire_binding(&unit);
                    }
                    self.fail(&unit, kind);
                }
            }
            AdapterSignal::Started => {
                for unit in self.registry.resolve_playback(&key) {
                    self.notify("started", |l| l.on_started(&unit));
                    if let Some(url) = self.units.take_impression_url(&unit) {
                        self.io.tracker.fire_and_forget(&url);
                    }
                }
            }
            AdapterSignal::Clicked => {
                for unit in self.registry.resolve_playback(&key) {
                    self.notify("clicked", |l| l.on_clicked(&unit));
                    if let Some(url) = self.units.take_click_url(&unit) {
                        self.io.tracker.fire_and_forget(&url);
                    }
                }
            }
            AdapterSignal::PlaybackFailed(kind) => {
                for unit in self.registry.resolve_playback(&key) {
                    self.notify("playback_error", |l| l.on_playback_error(&unit, kind));
                    self.end_playback(&unit);
                }
            }
            AdapterSignal::Closed => {
                for unit in self.registry.resolve_playback(&key) {
                    self.notify("closed", |l| l.on_closed(&unit));
                    self.end_playback(&unit);
                }
            }
            AdapterSignal::Completed(reward) => self.on_completed(&key, reward),
        }
    }

    fn on_completed(&mut self, key: &NetworkKey, reported: Reward) {
        let units = self.registry.fan_out(key);
        if let Some(url) = self.completion_url_for(&units) {
            info!(
                target = "rewarded.router",
                network = %key,
                "confirming completion with server"
            );
            self.io
                .tracker
                .confirm_completion(&url, self.customer_id.as_deref());
            return;
        }
        if units.is_empty() {
            warn!(
                target = "rewarded.router",
                network = %key,
                "completion for a network with no units; dropping"
            );
            return;
        }
        let reward = choose_reward(self.rewards.last_shown(&key.kind), &reported);
        info!(
            target = "rewarded.router",
            network = %key,
            units = units.len(),
            successful = reward.is_successful(),
            label = reward.label(),
            amount = reward.amount(),
            "rewarding completion"
        );
        self.notify("completed", |l| l.on_completed(&units, &reward));
    }

    /// The displaying unit's completion URL when one is on screen, otherwise the
    /// first unit of the fan-out that has one.
    fn completion_url_for(&self, units: &BTreeSet<UnitId>) -> Option<String> {
        match self.registry.displaying() {
            Some(unit) => self.rewards.completion_url(unit).map(str::to_string),
            None => units
                .iter()
                .find_map(|unit| self.rewards.completion_url(unit))
                .map(str::to_string),
        }
    }
}
