use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use uuid::Uuid;

use crate::error::AdErrorKind;
use crate::types::UnitId;

/// One outbound ad request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdRequest {
    pub unit_id: UnitId,
    pub endpoint: String,
    pub correlation: Uuid,
}

/// Backend answer describing which adapter to run and how to track it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdResponse {
    pub adapter_kind: Option<String>,
    pub failover_url: Option<String>,
    pub impression_tracking_url: Option<String>,
    pub click_tracking_url: Option<String>,
    pub timeout_millis: Option<i64>,
    pub currency_name: Option<String>,
    pub currency_amount: Option<String>,
    pub completion_url: Option<String>,
    pub server_extras: BTreeMap<String, String>,
}

impl AdResponse {
    pub fn for_adapter(kind: impl Into<String>) -> Self {
        Self {
            adapter_kind: Some(kind.into()),
            ..Self::default()
        }
    }

    /// Server timeout hint, or `default` when absent or non-positive.
    pub fn load_timeout(&self, default: Duration) -> Duration {
        match self.timeout_millis {
            Some(millis) if millis > 0 => Duration::from_millis(millis.max(1) as u64),
            _ => default,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportErrorReason {
    NoFill,
    WarmingUp,
    BadBody,
    BadHeaderData,
    NoConnection,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason:?}: {detail}")]
pub struct TransportError {
    pub reason: TransportErrorReason,
    pub detail: String,
}

impl TransportError {
    pub fn new(reason: TransportErrorReason, detail: impl Into<String>) -> Self {
        Self {
            reason,
            detail: detail.into(),
        }
    }

    /// Listener-facing code for this transport failure.
    pub fn error_kind(&self) -> AdErrorKind {
        match self.reason {
            TransportErrorReason::NoFill | TransportErrorReason::WarmingUp => AdErrorKind::NoFill,
            TransportErrorReason::NoConnection => AdErrorKind::NoConnection,
            TransportErrorReason::BadBody
            | TransportErrorReason::BadHeaderData
            | TransportErrorReason::Other => AdErrorKind::Internal,
        }
    }
}

pub type TransportResult = Result<AdResponse, TransportError>;

#[async_trait]
pub trait AdTransport: Send + Sync {
    async fn send(&self, request: AdRequest) -> TransportResult;
}

#[derive(Default)]
struct Script {
    queued: VecDeque<TransportResult>,
    sticky: Option<TransportResult>,
}

/// In-memory transport answering from per-endpoint scripts.
///
/// Queued outcomes are served first, then the sticky outcome. Endpoints with no
/// script answer with an `Other` error. While held, sends wait until released.
pub struct ScriptedTransport {
    scripts: Mutex<HashMap<String, Script>>,
    sent: Mutex<Vec<AdRequest>>,
    gate: watch::Sender<bool>,
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
            gate: watch::channel(true).0,
        }
    }
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a single outcome for `endpoint`.
    pub fn respond_once(&self, endpoint: impl Into<String>, outcome: TransportResult) {
        self.scripts
            .lock()
            .entry(endpoint.into())
            .or_default()
            .queued
            .push_back(outcome);
    }

    /// Sets the outcome returned once the queue for `endpoint` is empty.
    pub fn respond_always(&self, endpoint: impl Into<String>, outcome: TransportResult) {
        self.scripts.lock().entry(endpoint.into()).or_default().sticky = Some(outcome);
    }

    pub fn hold(&self) {
        self.gate.send_replace(false);
    }

    pub fn release(&self) {
        self.gate.send_replace(true);
    }

    pub fn requests(&self) -> Vec<AdRequest> {
        self.sent.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.sent.lock().len()
    }

    fn next_outcome(&self, endpoint: &str) -> TransportResult {
        let mut scripts = self.scripts.lock();
        let Some(script) = scripts.get_mut(endpoint) else {
            return Err(TransportError::new(
                TransportErrorReason::Other,
                format!("no scripted response for {endpoint}"),
            ));
        };
        if let Some(outcome) = script.queued.pop_front() {
            return outcome;
        }
        script.sticky.clone().unwrap_or_else(|| {
            Err(TransportError::new(
                TransportErrorReason::Other,
                format!("script exhausted for {endpoint}"),
            ))
        })
    }
}

#[async_trait]
impl AdTransport for ScriptedTransport {
    async fn send(&self, request: AdRequest) -> TransportResult {
        self.sent.lock().push(request.clone());
        let mut gate = self.gate.subscribe();
        if gate.wait_for(|open| *open).await.is_err() {
            return Err(TransportError::new(
                TransportErrorReason::Other,
                "transport dropped",
            ));
        }
        self.next_outcome(&request.endpoint)
    }
}
