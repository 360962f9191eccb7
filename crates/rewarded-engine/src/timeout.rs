use std::collections::HashMap;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::trace;

use crate::types::UnitId;

pub type TimerId = u64;

struct ArmedTimer {
    id: TimerId,
    handle: JoinHandle<()>,
}

/// One cancellable load timer per unit.
///
/// A timer never touches engine state directly: when it elapses it invokes the
/// notify callback with its id, and the owner calls [`TimeoutRegistry::claim`]
/// to learn whether that id is still the armed one. Cancelled or replaced timers
/// therefore stay inert even if their sleep already finished.
#[derive(Default)]
pub struct TimeoutRegistry {
    timers: HashMap<UnitId, ArmedTimer>,
    next_id: TimerId,
}

impl TimeoutRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms a timer for `unit`, replacing any timer already armed for it.
    pub fn arm<F>(&mut self, unit: &str, after: Duration, notify: F) -> TimerId
    where
        F: FnOnce(TimerId) + Send + 'static,
    {
        self.cancel(unit);
        self.next_id += 1;
        let id = self.next_id;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            notify(id);
        });
        trace!(
            target = "rewarded.timeout",
            unit_id = unit,
            timer_id = id,
            after_ms = after.as_millis() as u64,
            "armed load timer"
        );
        self.timers.insert(unit.to_string(), ArmedTimer { id, handle });
        id
    }

    /// Cancels the timer for `unit`. Returns whether one was armed.
    pub fn cancel(&mut self, unit: &str) -> bool {
        match self.timers.remove(unit) {
            Some(timer) => {
                timer.handle.abort();
                trace!(
                    target = "rewarded.timeout",
                    unit_id = unit,
                    timer_id = timer.id,
                    "cancelled load timer"
                );
                true
            }
            None => false,
        }
    }

    /// Consumes the timer entry if `id` is still the one armed for `unit`.
    pub fn claim(&mut self, unit: &str, id: TimerId) -> bool {
        match self.timers.get(unit) {
            Some(timer) if timer.id == id => {
                self.timers.remove(unit);
                true
            }
            _ => false,
        }
    }

    pub fn is_armed(&self, unit: &str) -> bool {
        self.timers.contains_key(unit)
    }

    pub fn cancel_all(&mut self) {
        for (_, timer) in self.timers.drain() {
            timer.handle.abort();
        }
    }
}

impl Drop for TimeoutRegistry {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
