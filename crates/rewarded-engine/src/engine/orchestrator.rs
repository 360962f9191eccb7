use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::adapter::{catch_adapter_panic, AdapterContext, AdapterEvents, LocalParams};
use crate::error::AdErrorKind;
use crate::metrics;
use crate::registry::AdapterBinding;
use crate::settings::SettingsBag;
use crate::state::LoadStatus;
use crate::timeout::TimerId;
use crate::transport::{AdRequest, AdResponse, TransportError, TransportResult};
use crate::types::{AdapterKind, NetworkKey, RequestParameters, UnitId};

use super::core::{dispose_adapter, EngineCore};
use super::Command;

impl EngineCore {
    pub(super) fn load(&mut self, unit: UnitId, params: RequestParameters, settings: SettingsBag) {
        self.settings.replace_instance(&unit, settings);
        if let Some(customer_id) = params.customer_id.as_deref().filter(|id| !id.is_empty()) {
            self.customer_id = Some(customer_id.to_string());
        }
        let endpoint = self.io.endpoints.build(&unit, &params);
        self.request(&unit, endpoint);
    }

    /// Issues a request for `unit` unless one is pending or the unit is on screen.
    pub(super) fn request(&mut self, unit: &str, endpoint: String) {
        if !self.units.accepts_load(unit) {
            metrics::REQUESTS_DEDUPED.inc();
            debug!(
                target = "rewarded.orchestrator",
                unit_id = unit,
                status = ?self.units.status(unit),
                "unit busy; not issuing another request"
            );
            return;
        }
        self.timeouts.cancel(unit);
        self.retire_binding(unit);
        self.units.mark_loading(unit);
        let request_id = self.next_request_id();
        self.in_flight.insert(unit.to_string(), request_id);
        metrics::REQUESTS_ISSUED.inc();
        debug!(
            target = "rewarded.orchestrator",
            unit_id = unit,
            request_id,
            endpoint = %endpoint,
            "issuing ad request"
        );

        let request = AdRequest {
            unit_id: unit.to_string(),
            endpoint,
            correlation: self.correlation,
        };
        let transport = Arc::clone(&self.io.transport);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let unit = request.unit_id.clone();
            let result = transport.send(request).await;
            let _ = tx.send(Command::Response {
                unit,
                request: request_id,
                result,
            });
        });
    }

    pub(super) fn on_response(&mut self, unit: UnitId, request_id: u64, result: TransportResult) {
        let current = self.in_flight.get(&unit).copied();
        if current != Some(request_id) || !self.units.is_loading(&unit) {
            debug!(
                target = "rewarded.orchestrator",
                unit_id = %unit,
                request_id,
                "response no longer awaited; dropping"
            );
            return;
        }
        self.in_flight.remove(&unit);
        match result {
            Ok(response) => self.on_ad_response(&unit, response),
            Err(err) => self.on_transport_error(&unit, err),
        }
    }

    fn on_ad_response(&mut self, unit: &str, response: AdResponse) {
        self.units.record_response(
            unit,
            response.failover_url.clone(),
            response.impression_tracking_url.clone(),
            response.click_tracking_url.clone(),
        );
        let timeout = response.load_timeout(self.default_timeout);

        let Some(kind_name) = response.adapter_kind.as_deref().filter(|k| !k.is_empty()) else {
            error!(
                target = "rewarded.orchestrator",
                unit_id = unit,
                "response named no adapter kind"
            );
            self.fail(unit, AdErrorKind::AdapterConfiguration);
            return;
        };

        self.timeouts.cancel(unit);
        self.retire_binding(unit);

        let mut adapter = match self.io.catalog.instantiate(kind_name) {
            Ok(adapter) => adapter,
            Err(err) => {
                error!(
                    target = "rewarded.orchestrator",
                    unit_id = unit,
                    kind = kind_name,
                    error = %err,
                    "couldn't create adapter"
                );
                self.fail(unit, AdErrorKind::AdapterConfiguration);
                return;
            }
        };

        self.rewards.update_unit_terms(
            unit,
            response.currency_name.as_deref(),
            response.currency_amount.as_deref(),
        );
        self.rewards
            .update_completion_url(unit, response.completion_url.as_deref());

        let Some(surface) = self.io.surface.current_surface() else {
            warn!(
                target = "rewarded.orchestrator",
                unit_id = unit,
                kind = kind_name,
                "no display surface; abandoning load"
            );
            dispose_adapter(unit, adapter.as_mut());
            self.units.mark_failed(unit);
            self.registry.clear_displaying(unit);
            self.notify("load_failure", |l| {
                l.on_load_failure(unit, AdErrorKind::NoDisplaySurface)
            });
            return;
        };

        let kind = AdapterKind::new(kind_name);
        let binding = self.next_binding_id();
        let timer_tx = self.tx.clone();
        let timer_unit = unit.to_string();
        self.timeouts.arm(unit, timeout, move |timer| {
            let _ = timer_tx.send(Command::TimeoutFired {
                unit: timer_unit,
                timer,
            });
        });

        let ctx = AdapterContext {
            surface,
            events: AdapterEvents::new(kind.clone(), binding, self.tx.clone()),
        };
        let local = LocalParams {
            unit_id: unit.to_string(),
            currency_name: response.currency_name.clone(),
            currency_amount: response.currency_amount.clone(),
            correlation: self.correlation,
            customer_id: self.customer_id.clone(),
            settings: self.settings.snapshot(unit),
        };
        let started = catch_adapter_panic(|| {
            adapter.load_content(ctx, local, &response.server_extras)
        })
        .and_then(|inner| inner);
        if let Err(err) = started {
            error!(
                target = "rewarded.orchestrator",
                unit_id = unit,
                kind = %kind,
                error = %err,
                "adapter rejected load"
            );
            self.timeouts.cancel(unit);
            dispose_adapter(unit, adapter.as_mut());
            self.fail(unit, AdErrorKind::AdapterConfiguration);
            return;
        }

        let key = NetworkKey::new(kind, adapter.network_id());
        info!(
            target = "rewarded.orchestrator",
            unit_id = unit,
            network = %key,
            binding,
            timeout_ms = timeout.as_millis() as u64,
            "adapter loading"
        );
        self.registry.install(
            unit,
            AdapterBinding {
                id: binding,
                key,
                adapter,
            },
        );
        self.units.mark_loaded(unit);
    }

    fn on_transport_error(&mut self, unit: &str, err: TransportError) {
        let kind = err.error_kind();
        warn!(
            target = "rewarded.orchestrator",
            unit_id = unit,
            reason = ?err.reason,
            error = %err,
            mapped = kind.as_str(),
            "ad request failed"
        );
        self.fail(unit, kind);
    }

    /// Ends the current cycle for `unit`, advancing to the failover endpoint when
    /// the error allows it and one was supplied. Otherwise the listener hears of it.
    pub(super) fn fail(&mut self, unit: &str, kind: AdErrorKind) {
        self.timeouts.cancel(unit);
        let failover = if kind.allows_failover() {
            self.units.take_failover_url(unit)
        } else {
            None
        };
        self.units.mark_failed(unit);
        self.registry.clear_displaying(unit);

        match failover {
            Some(url) => {
                metrics::FAILOVERS.inc();
                info!(
                    target = "rewarded.orchestrator",
                    unit_id = unit,
                    error = kind.as_str(),
                    "trying failover endpoint"
                );
                self.request(unit, url);
            }
            None => self.notify("load_failure", |l| l.on_load_failure(unit, kind)),
        }
    }

    pub(super) fn on_timeout(&mut self, unit: &str, timer: TimerId) {
        if !self.timeouts.claim(unit, timer) {
            debug!(
                target = "rewarded.timeout",
                unit_id = unit,
                timer_id = timer,
                "stale load timer; ignoring"
            );
            return;
        }
        let status = self.units.status(unit);
        if !matches!(status, LoadStatus::Loading | LoadStatus::Loaded) {
            debug!(
                target = "rewarded.timeout",
                unit_id = unit,
                timer_id = timer,
                status = ?status,
                "load timer outlived its cycle; ignoring"
            );
            return;
        }
        metrics::LOAD_TIMEOUTS.inc();
        warn!(
            target = "rewarded.timeout",
            unit_id = unit,
            timer_id = timer,
            "adapter did not finish loading in time"
        );
        self.retire_binding(unit);
        self.fail(unit, AdErrorKind::NetworkTimeout);
    }

    /// Unbinds and disposes the adapter backing `unit`, if any. Its later events
    /// no longer pass the liveness check.
    pub(super) fn retire_binding(&mut self, unit: &str) {
        if let Some(mut binding) = self.registry.remove(unit) {
            self.registry.clear_displaying(unit);
            dispose_adapter(unit, binding.adapter.as_mut());
        }
    }

    pub(super) fn has_playable_content(&self, unit: &str) -> bool {
        self.units.can_play(unit)
            && self
                .registry
                .get(unit)
                .is_some_and(|binding| binding.adapter.has_content_available())
    }

    pub(super) fn show(&mut self, unit: &str) {
        if !self.has_playable_content(unit) {
            metrics::SHOW_REJECTED.inc();
            debug!(
                target = "rewarded.orchestrator",
                unit_id = unit,
                status = ?self.units.status(unit),
                "nothing playable for unit"
            );
            self.notify("load_failure", |l| {
                l.on_load_failure(unit, AdErrorKind::VideoNotAvailable)
            });
            return;
        }
        let Some(binding) = self.registry.get(unit) else {
            return;
        };
        let kind = binding.kind().clone();
        self.rewards.capture_last_shown(&kind, unit);
        self.timeouts.cancel(unit);
        self.registry.set_displaying(unit);
        self.units.mark_playing(unit);
        info!(
            target = "rewarded.orchestrator",
            unit_id = unit,
            kind = %kind,
            "presenting"
        );

        let presented = match self.registry.get_mut(unit) {
            Some(binding) => catch_adapter_panic(|| binding.adapter.present()),
            None => Ok(()),
        };
        if let Err(err) = presented {
            error!(
                target = "rewarded.orchestrator",
                unit_id = unit,
                error = %err,
                "adapter panicked while presenting"
            );
            self.notify("playback_error", |l| {
                l.on_playback_error(unit, AdErrorKind::VideoPlayback)
            });
            self.end_playback(unit);
        }
    }

    /// Moves a playing unit out of `Playing` and releases the display slot.
    pub(super) fn end_playback(&mut self, unit: &str) {
        if self.units.status(unit) == LoadStatus::Playing {
            self.units.mark_failed(unit);
        }
        self.registry.clear_displaying(unit);
    }
}
