//! Error taxonomy for hearthsignal.
//!
//! Mirrors the exception hierarchy of the system this crate models
//! (`LumehavenError` → `SmartHomeConnectionError` / `AdapterError` /
//! `SignalNotFoundError`), expressed as `thiserror` variants instead of a
//! class hierarchy so callers can match on the concrete failure instead of
//! catching a common base type.

use thiserror::Error;

/// Errors raised by an upstream adapter (C4).
///
/// `subscribe_events` and `snapshot` both return this type. The manager
/// (C5) never needs to distinguish further than "connection failed" vs.
/// "item not found", so those are the only two variants.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Transport-level failure talking to the upstream (HTTP error, SSE
    /// stream error, unexpected non-2xx on a bulk fetch).
    #[error("failed to connect to {upstream_type} at {url}: {cause}")]
    ConnectionFailure {
        upstream_type: String,
        url: String,
        cause: String,
    },

    /// A single-item lookup (`GET /rest/items/{name}`) returned 404.
    /// Never produced by bulk `snapshot()`.
    #[error("signal not found: {id}")]
    SignalNotFound { id: String },
}

impl AdapterError {
    pub fn connection_failure(
        upstream_type: impl Into<String>,
        url: impl Into<String>,
        cause: impl std::fmt::Display,
    ) -> Self {
        AdapterError::ConnectionFailure {
            upstream_type: upstream_type.into(),
            url: url.into(),
            cause: cause.to_string(),
        }
    }
}

/// Bootstrap-time configuration errors. Fatal — raised before `start_all()`
/// is ever called, per spec §7.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("duplicate adapter name '{0}': adapter names must be unique")]
    DuplicateAdapterName(String),

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}
