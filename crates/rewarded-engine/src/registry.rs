use std::collections::{BTreeSet, HashMap};

use crate::adapter::{BindingId, RewardedAdapter};
use crate::types::{AdapterKind, NetworkKey, UnitId};

/// The live adapter bound to one unit.
pub struct AdapterBinding {
    pub id: BindingId,
    pub key: NetworkKey,
    pub adapter: Box<dyn RewardedAdapter>,
}

impl AdapterBinding {
    pub fn kind(&self) -> &AdapterKind {
        &self.key.kind
    }
}

impl std::fmt::Debug for AdapterBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterBinding")
            .field("id", &self.id)
            .field("key", &self.key)
            .finish()
    }
}

/// Bidirectional map between units and the `(kind, network id)` pair backing them.
#[derive(Debug, Default)]
pub struct NetworkIndex {
    by_key: HashMap<NetworkKey, BTreeSet<UnitId>>,
    by_unit: HashMap<UnitId, NetworkKey>,
}

impl NetworkIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associates `unit` with `key`, dropping any previous association.
    pub fn bind(&mut self, unit: &str, key: NetworkKey) {
        self.unbind(unit);
        self.by_key
            .entry(key.clone())
            .or_default()
            .insert(unit.to_string());
        self.by_unit.insert(unit.to_string(), key);
    }

    pub fn unbind(&mut self, unit: &str) -> Option<NetworkKey> {
        let key = self.by_unit.remove(unit)?;
        if let Some(units) = self.by_key.get_mut(&key) {
            units.remove(unit);
            if units.is_empty() {
                self.by_key.remove(&key);
            }
        }
        Some(key)
    }

    pub fn units_for(&self, key: &NetworkKey) -> BTreeSet<UnitId> {
        self.by_key.get(key).cloned().unwrap_or_default()
    }

    #[cfg(test)]
    pub(crate) fn key_for(&self, unit: &str) -> Option<&NetworkKey> {
        self.by_unit.get(unit)
    }
}

/// Live adapter bindings, the network index over them, and the unit on screen.
#[derive(Debug, Default)]
pub struct BindingRegistry {
    bindings: HashMap<UnitId, AdapterBinding>,
    index: NetworkIndex,
    displaying: Option<UnitId>,
}

impl BindingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `binding` for `unit`. Any previous binding is returned undisposed.
    pub fn install(&mut self, unit: &str, binding: AdapterBinding) -> Option<AdapterBinding> {
        let previous = self.remove(unit);
        self.index.bind(unit, binding.key.clone());
        self.bindings.insert(unit.to_string(), binding);
        previous
    }

    pub fn remove(&mut self, unit: &str) -> Option<AdapterBinding> {
        self.index.unbind(unit);
        self.bindings.remove(unit)
    }

    pub fn get(&self, unit: &str) -> Option<&AdapterBinding> {
        self.bindings.get(unit)
    }

    pub fn get_mut(&mut self, unit: &str) -> Option<&mut AdapterBinding> {
        self.bindings.get_mut(unit)
    }

    pub fn is_live(&self, id: BindingId) -> bool {
        self.bindings.values().any(|binding| binding.id == id)
    }

    /// Every unit backed by `key`.
    pub fn fan_out(&self, key: &NetworkKey) -> BTreeSet<UnitId> {
        self.index.units_for(key)
    }

    /// Units a playback-scoped event applies to: the displaying unit when one is
    /// set, otherwise the full fan-out.
    pub fn resolve_playback(&self, key: &NetworkKey) -> BTreeSet<UnitId> {
        match &self.displaying {
            Some(unit) => BTreeSet::from([unit.clone()]),
            None => self.fan_out(key),
        }
    }

    pub fn set_displaying(&mut self, unit: &str) {
        self.displaying = Some(unit.to_string());
    }

    /// Clears the displaying unit if it is `unit`.
    pub fn clear_displaying(&mut self, unit: &str) {
        if self.displaying.as_deref() == Some(unit) {
            self.displaying = None;
        }
    }

    pub fn displaying(&self) -> Option<&str> {
        self.displaying.as_deref()
    }

    pub fn index(&self) -> &NetworkIndex {
        &self.index
    }

    /// Removes every binding, leaving disposal to the caller.
    pub fn drain(&mut self) -> Vec<(UnitId, AdapterBinding)> {
        self.index = NetworkIndex::new();
        self.displaying = None;
        self.bindings.drain().collect()
    }
}
