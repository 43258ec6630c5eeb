//! Settings for reaching the items API.
//!
//! # Design
//! `SyncConfig::default()` matches the mock server on localhost. Environment
//! overrides go through `from_lookup` so tests can feed a map instead of
//! mutating the process environment. Unset keys log the default they fall
//! back to; set but unusable keys are a `ConfigError`.

use std::{env, fmt::Display, str::FromStr, time::Duration};

use tracing::info;

use crate::error::ConfigError;

pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// Connection settings for the remote items API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub base_url: String,
    /// Extra attempts for list requests.
    pub read_retries: u32,
    /// Extra attempts for create, update and delete requests.
    pub write_retries: u32,
    pub timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            read_retries: 2,
            write_retries: 1,
            timeout: Duration::from_secs(10),
        }
    }
}

impl SyncConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Unset keys fall back to the defaults; set but malformed keys are errors.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            base_url: lookup("LISTSYNC_BASE_URL").unwrap_or_else(|| {
                info!("LISTSYNC_BASE_URL not set, using default: {}", defaults.base_url);
                defaults.base_url
            }),
            read_retries: try_load(&lookup, "LISTSYNC_READ_RETRIES", defaults.read_retries)?,
            write_retries: try_load(&lookup, "LISTSYNC_WRITE_RETRIES", defaults.write_retries)?,
            timeout: load_timeout(&lookup, defaults.timeout)?,
        })
    }
}

/// A zero timeout would fail every request, so it is rejected.
fn load_timeout(lookup: &impl Fn(&str) -> Option<String>, default: Duration) -> Result<Duration, ConfigError> {
    const KEY: &str = "LISTSYNC_TIMEOUT_MS";
    match try_load(lookup, KEY, default.as_millis() as u64)? {
        0 => Err(ConfigError::Invalid {
            key: KEY,
            reason: "timeout must be greater than zero".to_string(),
        }),
        ms => Ok(Duration::from_millis(ms)),
    }
}

fn try_load<T>(lookup: &impl Fn(&str) -> Option<String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr + Display,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }),
        None => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}
