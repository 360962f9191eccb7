use std::fmt;

use serde::{Deserialize, Serialize};

/// Caller-supplied key naming one logical rewarded placement.
pub type UnitId = String;

/// Third-party identifier for the content unit behind an adapter. May be empty.
pub type NetworkId = String;

/// Identifies which adapter implementation produced a binding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AdapterKind(String);

impl AdapterKind {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AdapterKind {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for AdapterKind {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Routing key for adapter-originated events.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NetworkKey {
    pub kind: AdapterKind,
    pub network_id: NetworkId,
}

impl NetworkKey {
    pub fn new(kind: AdapterKind, network_id: impl Into<NetworkId>) -> Self {
        Self {
            kind,
            network_id: network_id.into(),
        }
    }
}

impl fmt::Display for NetworkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.network_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy_meters: Option<f32>,
}

/// Optional targeting attached to a load call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestParameters {
    pub keywords: Option<String>,
    pub location: Option<Location>,
    pub customer_id: Option<String>,
}

impl RequestParameters {
    pub fn with_keywords(keywords: impl Into<String>) -> Self {
        Self {
            keywords: Some(keywords.into()),
            ..Self::default()
        }
    }

    pub fn location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub fn customer_id(mut self, customer_id: impl Into<String>) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }
}
