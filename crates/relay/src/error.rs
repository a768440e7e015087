//! Error types for the relay pipeline.
//!
//! Each stage of a poll cycle has its own error type so the driver can decide
//! per stage whether a failure ends the cycle (source) or only the current
//! alert (everything else).

use thiserror::Error;

pub use notify::ChannelError as NotifyError;

/// The alert source could not deliver an alert set. Transient; the next
/// cycle tries again.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Transport-level failure (connect, timeout, TLS).
    #[error("alert source unavailable: {0}")]
    Request(#[from] reqwest::Error),

    /// The source answered with a non-success status.
    #[error("alert source returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The body was not the expected `{ "data": [...] }` envelope.
    #[error("alert source returned an unexpected payload: {0}")]
    Payload(String),
}

/// A raw alert that cannot be given a stable identity.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MalformedAlert {
    #[error("alert record is not a JSON object")]
    NotAnObject,

    #[error("alert has no fingerprint")]
    MissingFingerprint,
}

/// The dedup cache could not answer.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("dedup cache unavailable: {0}")]
    Unavailable(String),

    #[error("dedup cache operation timed out after {0}s")]
    Timeout(u64),

    #[error("cached snapshot could not be (de)serialized: {0}")]
    Snapshot(#[from] serde_json::Error),
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        Self::Unavailable(err.to_string())
    }
}

/// Startup configuration is missing or invalid.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
