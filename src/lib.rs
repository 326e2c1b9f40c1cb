//! Resilient API client for the EA Solutions front-end
//!
//! A single entry point for all outbound HTTP calls, applying four layers of
//! protection transparently to the caller:
//!
//! - **Response caching** with per-request TTL ([`cache`])
//! - **Request deduplication**: concurrent identical requests share one
//!   network call
//! - **Retry with exponential backoff** and per-attempt timeouts
//!   ([`failsafe`])
//! - **Circuit breaker** that trips after repeated failures and recovers via
//!   a half-open probe ([`failsafe`])
//!
//! # Example
//!
//! ```no_run
//! use ea_api_client::{ApiClient, ClientConfig, RequestConfig, RequestOptions};
//! use std::time::Duration;
//!
//! # async fn run() -> ea_api_client::Result<()> {
//! let api = ApiClient::new(ClientConfig {
//!     base_url: "https://api.easolutions.example".into(),
//!     ..ClientConfig::default()
//! })?;
//!
//! let products: serde_json::Value = api
//!     .request(
//!         "/api/products",
//!         RequestOptions::get(),
//!         RequestConfig {
//!             ttl: Duration::from_secs(600),
//!             ..RequestConfig::default()
//!         },
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cache;
pub mod client;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod failsafe;
mod inflight;

pub use cache::CacheStatsSnapshot;
pub use client::{ApiClient, BatchRequest, RequestOptions};
pub use config::{ClientConfig, Priority, RequestConfig};
pub use error::{Error, Result};
pub use failsafe::{CircuitBreakerStatus, CircuitState};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
///
/// # Errors
///
/// Returns an error when a global subscriber is already installed.
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    let result = match format {
        Some("json") => subscriber.with(fmt::layer().json()).try_init(),
        _ => subscriber.with(fmt::layer()).try_init(),
    };

    result.map_err(|e| Error::Config(format!("failed to install tracing subscriber: {e}")))
}
