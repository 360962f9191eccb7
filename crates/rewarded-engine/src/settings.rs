use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use crate::types::UnitId;

/// Marker for network-specific configuration objects handed to adapters.
///
/// Lookups match the exact concrete type only.
pub trait MediationSettings: Any + Send + Sync {}

/// A set of mediation settings keyed by concrete type.
#[derive(Clone, Default)]
pub struct SettingsBag {
    entries: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl SettingsBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `settings`, replacing an existing entry of the same type.
    pub fn insert<T: MediationSettings>(&mut self, settings: T) {
        self.entries.insert(TypeId::of::<T>(), Arc::new(settings));
    }

    pub fn with<T: MediationSettings>(mut self, settings: T) -> Self {
        self.insert(settings);
        self
    }

    pub fn get<T: MediationSettings>(&self) -> Option<Arc<T>> {
        self.entries
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|entry| entry.downcast::<T>().ok())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for SettingsBag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsBag")
            .field("entries", &self.entries.len())
            .finish()
    }
}

/// Global settings plus the per-unit pools. A load replaces the unit's pool wholesale.
#[derive(Debug, Default)]
pub struct SettingsStore {
    global: SettingsBag,
    instances: HashMap<UnitId, SettingsBag>,
}

impl SettingsStore {
    pub fn new(global: SettingsBag) -> Self {
        Self {
            global,
            instances: HashMap::new(),
        }
    }

    pub fn replace_instance(&mut self, unit: &str, settings: SettingsBag) {
        self.instances.insert(unit.to_string(), settings);
    }

    pub fn global(&self) -> &SettingsBag {
        &self.global
    }

    pub fn instance(&self, unit: &str) -> Option<&SettingsBag> {
        self.instances.get(unit)
    }

    pub fn snapshot(&self, unit: &str) -> SettingsSnapshot {
        SettingsSnapshot {
            global: self.global.clone(),
            instance: self.instances.get(unit).cloned().unwrap_or_default(),
        }
    }
}

/// Settings visible to an adapter while it loads.
#[derive(Debug, Clone, Default)]
pub struct SettingsSnapshot {
    pub global: SettingsBag,
    pub instance: SettingsBag,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct VungleSettings {
        user_id: String,
    }
    impl MediationSettings for VungleSettings {}

    #[derive(Debug, PartialEq)]
    struct ChartboostSettings;
    impl MediationSettings for ChartboostSettings {}

    #[test]
    fn lookup_is_by_exact_type() {
        let bag = SettingsBag::new().with(VungleSettings {
            user_id: "abc".into(),
        });
        assert_eq!(bag.get::<VungleSettings>().unwrap().user_id, "abc");
        assert!(bag.get::<ChartboostSettings>().is_none());
    }

    #[test]
    fn instance_settings_are_replaced_not_merged() {
        let mut store = SettingsStore::default();
        store.replace_instance(
            "u1",
            SettingsBag::new()
                .with(VungleSettings {
                    user_id: "abc".into(),
                })
                .with(ChartboostSettings),
        );
        store.replace_instance("u1", SettingsBag::new());
        let pool = store.instance("u1").expect("pool present");
        assert!(pool.is_empty());
        assert!(store.snapshot("u1").instance.get::<VungleSettings>().is_none());
    }
}
