//! Environment-variable configuration, loaded once at process start.
//!
//! Grounded on the teacher's `create_dashboard_if_configured`/`main` env-var
//! loading pattern and `lumehaven/config.py`'s `Settings`. All knobs are
//! `HEARTHSIGNAL_*`-prefixed; invalid or missing required values raise
//! `ConfigError` before `start_all()` ever runs, per spec §7.

use std::env;
use std::time::Duration;

use crate::error::ConfigError;
use crate::manager::BackoffConfig;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_SUBSCRIBER_QUEUE_SIZE: usize = 10_000;
const DEFAULT_DROP_LOG_INTERVAL_SECS: u64 = 10;
const DEFAULT_RETRY_INITIAL_SECS: u64 = 5;
const DEFAULT_RETRY_MAX_SECS: u64 = 300;
const DEFAULT_RETRY_BACKOFF: f64 = 2.0;
const DEFAULT_OPENHAB_NAME: &str = "openhab";
const DEFAULT_OPENHAB_PREFIX: &str = "oh";

/// Configuration for one OpenHAB adapter instance. A future multi-adapter,
/// multi-type config format would extend this into an enum; one variant is
/// all the single-adapter env-var format needs today.
#[derive(Debug, Clone)]
pub struct OpenHabConfig {
    pub url: String,
    pub name: String,
    pub prefix: String,
    pub tag: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub subscriber_queue_size: usize,
    pub drop_log_interval: Duration,
    pub backoff: BackoffConfig,
    pub cors_origins: Vec<String>,
    pub openhab: Option<OpenHabConfig>,
}

impl Settings {
    /// Load settings from the process environment. Fails fast on malformed
    /// numeric values; a missing `HEARTHSIGNAL_OPENHAB_URL` simply means no
    /// adapter is configured (not an error — the server still starts).
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = env::var("HEARTHSIGNAL_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
        let port = parse_env("HEARTHSIGNAL_PORT", DEFAULT_PORT)?;
        let subscriber_queue_size =
            parse_env("HEARTHSIGNAL_SUBSCRIBER_QUEUE_SIZE", DEFAULT_SUBSCRIBER_QUEUE_SIZE)?;
        let drop_log_interval_secs =
            parse_env("HEARTHSIGNAL_DROP_LOG_INTERVAL_SECS", DEFAULT_DROP_LOG_INTERVAL_SECS)?;
        let retry_initial_secs =
            parse_env("HEARTHSIGNAL_RETRY_INITIAL_SECS", DEFAULT_RETRY_INITIAL_SECS)?;
        let retry_max_secs = parse_env("HEARTHSIGNAL_RETRY_MAX_SECS", DEFAULT_RETRY_MAX_SECS)?;
        let retry_backoff = parse_env("HEARTHSIGNAL_RETRY_BACKOFF", DEFAULT_RETRY_BACKOFF)?;

        let cors_origins = env::var("HEARTHSIGNAL_CORS_ORIGINS")
            .ok()
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let openhab = match env::var("HEARTHSIGNAL_OPENHAB_URL").ok() {
            Some(url) if !url.is_empty() => Some(OpenHabConfig {
                url,
                name: env::var("HEARTHSIGNAL_OPENHAB_NAME")
                    .unwrap_or_else(|_| DEFAULT_OPENHAB_NAME.to_string()),
                prefix: env::var("HEARTHSIGNAL_OPENHAB_PREFIX")
                    .unwrap_or_else(|_| DEFAULT_OPENHAB_PREFIX.to_string()),
                tag: env::var("HEARTHSIGNAL_OPENHAB_TAG").ok(),
            }),
            _ => None,
        };

        Ok(Settings {
            host,
            port,
            subscriber_queue_size,
            drop_log_interval: Duration::from_secs(drop_log_interval_secs),
            backoff: BackoffConfig {
                initial: Duration::from_secs(retry_initial_secs),
                max: Duration::from_secs(retry_max_secs),
                multiplier: retry_backoff,
            },
            cors_origins,
            openhab,
        })
    }
}

fn parse_env<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match env::var(key) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw,
        }),
        Err(_) => Ok(default),
    }
}
