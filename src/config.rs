//! Configuration for the API client
//!
//! All structs are serde-deserializable with `#[serde(default)]` so an
//! embedding application can load them from whatever source it likes and
//! only override the knobs it cares about. Defaults carry the operational
//! constants the client ships with.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Main client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL all endpoints are resolved against, e.g. `https://api.example.com`
    pub base_url: String,
    /// Headers added to every request (merged under per-call headers)
    pub default_headers: HashMap<String, String>,
    /// Cache configuration
    pub cache: CacheConfig,
    /// Failsafe configuration
    pub failsafe: FailsafeConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            default_headers: HashMap::new(),
            cache: CacheConfig::default(),
            failsafe: FailsafeConfig::default(),
        }
    }
}

/// Cache configuration for response caching
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable response caching
    pub enabled: bool,
    /// Default TTL applied when a call does not set one
    #[serde(with = "humantime_serde")]
    pub default_ttl: Duration,
    /// Interval between background eviction sweeps
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_ttl: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

/// Failsafe configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FailsafeConfig {
    /// Circuit breaker configuration
    pub circuit_breaker: CircuitBreakerConfig,
    /// Retry configuration
    pub retry: RetryConfig,
}

/// Circuit breaker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Enable the circuit breaker
    pub enabled: bool,
    /// Consecutive failures before opening
    pub failure_threshold: u32,
    /// Successes required in half-open to close
    pub success_threshold: u32,
    /// Cooldown after the last failure before a half-open probe is allowed
    #[serde(with = "humantime_serde")]
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_threshold: 5,
            success_threshold: 1,
            reset_timeout: Duration::from_secs(30),
        }
    }
}

/// Retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Enable retries
    pub enabled: bool,
    /// Retries after the first attempt (3 retries = up to 4 attempts)
    pub max_retries: u32,
    /// Delay before the first retry
    #[serde(with = "humantime_serde")]
    pub initial_backoff: Duration,
    /// Ceiling on the backoff delay
    #[serde(with = "humantime_serde")]
    pub max_backoff: Duration,
    /// Backoff multiplier
    pub multiplier: f32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: 3,
            initial_backoff: Duration::from_millis(1000),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

/// Per-call request configuration
///
/// Every field has a default, so call sites only state what differs:
///
/// ```
/// use ea_api_client::config::RequestConfig;
/// use std::time::Duration;
///
/// let cfg = RequestConfig {
///     ttl: Duration::from_secs(600),
///     ..RequestConfig::default()
/// };
/// assert_eq!(cfg.retry, 3);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    /// Call priority, recorded on the request span
    pub priority: Priority,
    /// Whether a successful GET response may be cached
    pub cache: bool,
    /// Cache TTL for this call's response
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
    /// Retries after the first attempt
    pub retry: u32,
    /// Per-attempt timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            priority: Priority::Normal,
            cache: true,
            ttl: Duration::from_secs(300),
            retry: 3,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Call priority
///
/// Recorded on the request tracing span for operators; it does not affect
/// scheduling, queueing, or timeouts. The transport issues requests in
/// arrival order regardless of priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Background work (prefetches, warm-ups)
    Low,
    /// Default priority
    #[default]
    Normal,
    /// User-visible interactive calls
    High,
    /// Calls whose loss is a business event (bookings, payments)
    Critical,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Critical => "critical",
        };
        f.write_str(s)
    }
}
