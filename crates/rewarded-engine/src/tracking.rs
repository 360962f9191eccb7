use parking_lot::Mutex;

/// Outbound beacons the engine fires without waiting for a result.
pub trait TrackingSink: Send + Sync {
    /// One-shot impression or click URL.
    fn fire_and_forget(&self, url: &str);

    /// Server-side reward confirmation for a completed unit.
    fn confirm_completion(&self, url: &str, customer_id: Option<&str>);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackedCall {
    Beacon(String),
    Completion {
        url: String,
        customer_id: Option<String>,
    },
}

/// In-memory sink that records every call, for tests and dry runs.
#[derive(Debug, Default)]
pub struct RecordingTracker {
    calls: Mutex<Vec<TrackedCall>>,
}

impl RecordingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<TrackedCall> {
        self.calls.lock().clone()
    }

    pub fn beacons(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                TrackedCall::Beacon(url) => Some(url.clone()),
                TrackedCall::Completion { .. } => None,
            })
            .collect()
    }
}

impl TrackingSink for RecordingTracker {
    fn fire_and_forget(&self, url: &str) {
        self.calls.lock().push(TrackedCall::Beacon(url.to_string()));
    }

    fn confirm_completion(&self, url: &str, customer_id: Option<&str>) {
        self.calls.lock().push(TrackedCall::Completion {
            url: url.to_string(),
            customer_id: customer_id.map(str::to_string),
        });
    }
}
