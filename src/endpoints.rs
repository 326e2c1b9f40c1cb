//! Convenience endpoints built atop [`ApiClient::request`]
//!
//! Thin call sites fixing endpoint + per-call configuration. They carry no
//! logic of their own; what they document is the TTL, priority, and retry
//! choice appropriate to each call type.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::warn;

use crate::client::{ApiClient, RequestOptions};
use crate::config::{Priority, RequestConfig};
use crate::error::Result;

impl ApiClient {
    /// Record an analytics event
    ///
    /// Non-critical telemetry: the only call allowed to fail silently.
    /// Failures are logged at warn level and never surfaced, so analytics
    /// outages cannot break a user flow. Caching is disabled (every event
    /// must reach the backend) and a single retry keeps delivery cheap.
    pub async fn track_event(&self, event: &str, properties: Value) {
        let body = json!({ "event": event, "properties": properties });
        let config = RequestConfig {
            priority: Priority::High,
            cache: false,
            retry: 1,
            ..RequestConfig::default()
        };

        if let Err(e) = self
            .request_value("/api/analytics", RequestOptions::post(body), config)
            .await
        {
            warn!(event, error = %e, "Analytics event dropped");
        }
    }

    /// Send a chat message and return the assistant reply
    ///
    /// Interactive and slow on the backend side, so the per-attempt timeout
    /// is stretched to 30 seconds and responses are never cached.
    pub async fn chat(&self, messages: Value) -> Result<Value> {
        let config = RequestConfig {
            priority: Priority::High,
            cache: false,
            timeout: Duration::from_secs(30),
            ..RequestConfig::default()
        };
        self.request_value("/api/chat", RequestOptions::post(messages), config)
            .await
    }

    /// Fetch the product catalog
    ///
    /// The catalog changes rarely; cached for 10 minutes.
    pub async fn get_products<T: DeserializeOwned>(&self) -> Result<T> {
        let config = RequestConfig {
            ttl: Duration::from_secs(600),
            ..RequestConfig::default()
        };
        self.request("/api/products", RequestOptions::get(), config)
            .await
    }

    /// Create a booking
    ///
    /// Not idempotent, so retries are disabled: a timeout after the backend
    /// committed would otherwise double-book. Critical priority marks the
    /// span for operators.
    pub async fn create_booking(&self, booking: Value) -> Result<Value> {
        let config = RequestConfig {
            priority: Priority::Critical,
            cache: false,
            retry: 0,
            ..RequestConfig::default()
        };
        self.request_value("/api/bookings", RequestOptions::post(booking), config)
            .await
    }

    /// Run an ROI calculation for the given inputs
    pub async fn calculate_roi(&self, inputs: Value) -> Result<Value> {
        let config = RequestConfig {
            cache: false,
            ..RequestConfig::default()
        };
        self.request_value("/api/roi/calculate", RequestOptions::post(inputs), config)
            .await
    }

    /// Backend health check
    ///
    /// Zero retries and a 2-second timeout: a health probe that needs
    /// retrying is itself the answer.
    pub async fn health(&self) -> Result<Value> {
        let config = RequestConfig {
            cache: false,
            retry: 0,
            timeout: Duration::from_secs(2),
            ..RequestConfig::default()
        };
        self.request_value("/api/health", RequestOptions::get(), config)
            .await
    }

    /// Fetch the edge-delivered runtime configuration
    ///
    /// Effectively static per deploy; cached for an hour.
    pub async fn edge_config<T: DeserializeOwned>(&self) -> Result<T> {
        let config = RequestConfig {
            priority: Priority::Low,
            ttl: Duration::from_secs(3600),
            ..RequestConfig::default()
        };
        self.request("/api/edge/config", RequestOptions::get(), config)
            .await
    }

    /// Resolve the caller's geolocation at the edge
    ///
    /// Stable for a session; cached for 30 minutes.
    pub async fn edge_geo_location<T: DeserializeOwned>(&self) -> Result<T> {
        let config = RequestConfig {
            priority: Priority::Low,
            ttl: Duration::from_secs(1800),
            ..RequestConfig::default()
        };
        self.request("/api/edge/geo", RequestOptions::get(), config)
            .await
    }
}
