use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure codes surfaced to the listener for a single unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Error)]
#[serde(rename_all = "snake_case")]
pub enum AdErrorKind {
    #[error("adapter configuration error")]
    AdapterConfiguration,
    #[error("no fill")]
    NoFill,
    #[error("no connection")]
    NoConnection,
    #[error("internal error")]
    Internal,
    #[error("network timeout")]
    NetworkTimeout,
    #[error("video not available")]
    VideoNotAvailable,
    #[error("no display surface available")]
    NoDisplaySurface,
    #[error("video playback error")]
    VideoPlayback,
}

/// Coarse grouping of [`AdErrorKind`] that decides how a failure propagates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Timeout,
    NotAvailable,
    Environment,
    Playback,
}

impl AdErrorKind {
    pub fn category(self) -> ErrorCategory {
        match self {
            AdErrorKind::AdapterConfiguration => ErrorCategory::Configuration,
            AdErrorKind::NoFill | AdErrorKind::NoConnection | AdErrorKind::Internal => {
                ErrorCategory::Network
            }
            AdErrorKind::NetworkTimeout => ErrorCategory::Timeout,
            AdErrorKind::VideoNotAvailable => ErrorCategory::NotAvailable,
            AdErrorKind::NoDisplaySurface => ErrorCategory::Environment,
            AdErrorKind::VideoPlayback => ErrorCategory::Playback,
        }
    }

    /// Whether a failure of this kind may advance to the next failover endpoint.
    pub fn allows_failover(self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Configuration | ErrorCategory::Network | ErrorCategory::Timeout
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AdErrorKind::AdapterConfiguration => "adapter_configuration",
            AdErrorKind::NoFill => "no_fill",
            AdErrorKind::NoConnection => "no_connection",
            AdErrorKind::Internal => "internal",
            AdErrorKind::NetworkTimeout => "network_timeout",
            AdErrorKind::VideoNotAvailable => "video_not_available",
            AdErrorKind::NoDisplaySurface => "no_display_surface",
            AdErrorKind::VideoPlayback => "video_playback",
        }
    }
}

/// Errors returned by the engine's public entry points.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("rewarded engine not initialized; call init before loading or showing")]
    NotInitialized,
    #[error("rewarded engine already initialized")]
    AlreadyInitialized,
    #[error("rewarded engine worker has stopped")]
    Closed,
    #[error("no tokio runtime available to host the engine worker")]
    NoRuntime,
    #[error("invalid config value for {key}: {value}")]
    InvalidConfig { key: &'static str, value: String },
}

/// Errors raised while constructing or starting an adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterError {
    #[error("no adapter registered for kind {0}")]
    UnknownKind(String),
    #[error("adapter construction failed: {0}")]
    Construction(String),
    #[error("adapter failed to start loading: {0}")]
    Load(String),
    #[error("adapter panicked: {0}")]
    Panicked(String),
}
