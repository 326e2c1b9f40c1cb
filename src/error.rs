//! Error types for the API client

use std::time::Duration;

use thiserror::Error;

/// Result type alias for the API client
pub type Result<T> = std::result::Result<T, Error>;

/// API client errors
///
/// All variants carry owned, cloneable payloads so a failure from a
/// deduplicated in-flight request can be handed to every coalesced caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Circuit breaker is open; no request was attempted
    #[error("circuit breaker open: {0}")]
    BreakerOpen(String),

    /// Non-2xx HTTP response
    #[error("HTTP {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body (or reason phrase when the body is unreadable)
        message: String,
    },

    /// Connection-level or protocol-level transport failure
    #[error("transport error: {0}")]
    Transport(String),

    /// A single attempt exceeded its timeout
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// A 2xx response body failed to decode as JSON
    #[error("JSON decode error: {0}")]
    Json(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Classify a `reqwest` failure into the client taxonomy.
    ///
    /// Per-attempt timeouts surface as [`Error::Timeout`]; everything else
    /// on the transport path becomes [`Error::Transport`].
    pub(crate) fn from_reqwest(err: &reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout)
        } else {
            Self::Transport(err.to_string())
        }
    }

    /// Whether this failure is transient and worth retrying.
    ///
    /// Client errors (4xx) are assumed non-transient: the same request will
    /// fail the same way, so they are never retried. Decode failures on a
    /// 2xx body are equally deterministic.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Status { status, .. } => *status >= 500,
            Self::Transport(_) | Self::Timeout(_) => true,
            Self::BreakerOpen(_) | Self::Json(_) | Self::Config(_) => false,
        }
    }

    /// HTTP status code, when this error carries one.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
