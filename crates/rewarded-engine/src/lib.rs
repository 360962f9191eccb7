//! Rewarded Engine: mediation core for full-screen rewarded content.
//!
//! Responsibilities:
//! - requesting content per unit and walking failover chains
//! - binding one third-party adapter per unit and timing out slow loads
//! - routing adapter events back to units by `(kind, network id)`
//! - resolving which reward to pay on completion
//!
//! Everything stateful runs on one worker task; see [`engine`].

pub mod adapter;
pub mod config;
pub mod endpoint;
pub mod engine;
pub mod error;
pub mod facade;
pub mod http;
pub mod listener;
pub mod metrics;
pub mod registry;
pub mod reward;
pub mod settings;
pub mod state;
pub mod surface;
pub mod timeout;
pub mod tracking;
pub mod transport;
pub mod types;

pub use adapter::{
    AdapterCatalog, AdapterContext, AdapterEvents, AdapterSignal, BindingId, LocalParams,
    RewardedAdapter, ServerParams,
};
pub use config::EngineConfig;
pub use endpoint::{DefaultEndpointBuilder, EndpointBuilder, API_VERSION};
pub use engine::{Engine, EngineBuilder, EngineHandle, UnitSnapshot};
pub use error::{AdErrorKind, AdapterError, EngineError, ErrorCategory};
pub use facade::RewardedVideos;
pub use http::{HttpTracker, HttpTransport};
pub use listener::{ChannelListener, ListenerEvent, RewardedListener};
pub use reward::{choose_reward, Reward};
pub use settings::{MediationSettings, SettingsBag, SettingsSnapshot};
pub use state::LoadStatus;
pub use surface::{DisplaySurfaceProvider, Surface, SurfaceHandle, WeakSurface};
pub use tracking::{RecordingTracker, TrackedCall, TrackingSink};
pub use transport::{
    AdRequest, AdResponse, AdTransport, ScriptedTransport, TransportError, TransportErrorReason,
};
pub use types::{AdapterKind, Location, NetworkId, NetworkKey, RequestParameters, UnitId};
