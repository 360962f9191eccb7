use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::UnitId;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStatus {
    #[default]
    Idle,
    Loading,
    Loaded,
    Playing,
    Failed,
}

/// Per-cycle record for one unit. Entering `Loading` or `Failed` starts a fresh record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitRecord {
    pub status: LoadStatus,
    pub failover_url: Option<String>,
    pub impression_url: Option<String>,
    pub click_url: Option<String>,
}

impl UnitRecord {
    fn with_status(status: LoadStatus) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }
}

/// Load-state machine for every unit the engine has seen. Entries are never evicted.
#[derive(Debug, Default)]
pub struct UnitStateStore {
    units: HashMap<UnitId, UnitRecord>,
}

impl UnitStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self, unit: &str) -> LoadStatus {
        self.units
            .get(unit)
            .map(|record| record.status)
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub(crate) fn record(&self, unit: &str) -> Option<&UnitRecord> {
        self.units.get(unit)
    }

    pub fn is_loading(&self, unit: &str) -> bool {
        self.status(unit) == LoadStatus::Loading
    }

    pub fn accepts_load(&self, unit: &str) -> bool {
        !matches!(self.status(unit), LoadStatus::Loading | LoadStatus::Playing)
    }

    pub fn mark_loading(&mut self, unit: &str) {
        self.units
            .insert(unit.to_string(), UnitRecord::with_status(LoadStatus::Loading));
    }

    /// Stores the endpoints carried by a backend response for the current cycle.
    pub fn record_response(
        &mut self,
        unit: &str,
        failover_url: Option<String>,
        impression_url: Option<String>,
        click_url: Option<String>,
    ) {
        let record = self.units.entry(unit.to_string()).or_default();
        record.failover_url = failover_url.filter(|u| !u.is_empty());
        record.impression_url = impression_url.filter(|u| !u.is_empty());
        record.click_url = click_url.filter(|u| !u.is_empty());
    }

    pub fn mark_loaded(&mut self, unit: &str) {
        self.units.entry(unit.to_string()).or_default().status = LoadStatus::Loaded;
    }

    pub fn mark_playing(&mut self, unit: &str) {
        self.units.entry(unit.to_string()).or_default().status = LoadStatus::Playing;
    }

    pub fn mark_failed(&mut self, unit: &str) {
        self.units
            .insert(unit.to_string(), UnitRecord::with_status(LoadStatus::Failed));
    }

    pub fn can_play(&self, unit: &str) -> bool {
        self.status(unit) == LoadStatus::Loaded
    }

    pub fn take_failover_url(&mut self, unit: &str) -> Option<String> {
        self.units
            .get_mut(unit)
            .and_then(|record| record.failover_url.take())
    }

    pub fn take_impression_url(&mut self, unit: &str) -> Option<String> {
        self.units
            .get_mut(unit)
            .and_then(|record| record.impression_url.take())
    }

    pub fn take_click_url(&mut self, unit: &str) -> Option<String> {
        self.units
            .get_mut(unit)
            .and_then(|record| record.click_url.take())
    }
}
