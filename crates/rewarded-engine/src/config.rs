use std::time::Duration;

use crate::error::EngineError;

pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_AD_HOST: &str = "ads.mopub.com";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Used when the backend sends no positive timeout hint.
    pub default_load_timeout: Duration,
    /// Host for the default endpoint builder.
    pub ad_host: String,
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_load_timeout: DEFAULT_LOAD_TIMEOUT,
            ad_host: DEFAULT_AD_HOST.into(),
            log_filter: "info,rewarded_engine=debug".into(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, EngineError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`, falling back to defaults for missing keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, EngineError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let default_load_timeout = match lookup("REWARDED_LOAD_TIMEOUT_MS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(millis) if millis > 0 => Duration::from_millis(millis),
                _ => {
                    return Err(EngineError::InvalidConfig {
                        key: "REWARDED_LOAD_TIMEOUT_MS",
                        value: raw,
                    })
                }
            },
            None => defaults.default_load_timeout,
        };
        let ad_host = lookup("REWARDED_AD_HOST").unwrap_or(defaults.ad_host);
        let log_filter = lookup("REWARDED_LOG_FILTER")
            .or_else(|| lookup("RUST_LOG"))
            .unwrap_or(defaults.log_filter);
        Ok(Self {
            default_load_timeout,
            ad_host,
            log_filter,
        })
    }

    pub fn with_default_load_timeout(mut self, timeout: Duration) -> Self {
        self.default_load_timeout = timeout;
        self
    }

    pub fn with_ad_host(mut self, host: impl Into<String>) -> Self {
        self.ad_host = host.into();
        self
    }
}
