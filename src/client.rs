//! The API client: caching, deduplication, retry, and circuit breaking
//!
//! [`ApiClient`] is the single entry point through which all outbound calls
//! are issued. It is an explicitly constructed instance (no hidden globals):
//! the embedding application builds one at startup, hands out clones (cheap,
//! `Arc`-backed), and calls [`ApiClient::shutdown`] at teardown.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info_span};
use url::Url;

use crate::cache::{CacheStatsSnapshot, ResponseCache};
use crate::config::{ClientConfig, RequestConfig};
use crate::error::{Error, Result};
use crate::failsafe::{CircuitBreaker, CircuitBreakerStatus, RetryPolicy, with_retry};
use crate::inflight::{Flight, InflightTable};

/// Per-call request options
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// HTTP method (GET by default)
    pub method: Method,
    /// Headers merged over the client defaults for this call
    pub headers: HashMap<String, String>,
    /// JSON request body
    pub body: Option<Value>,
}

impl RequestOptions {
    /// Options for a plain GET
    #[must_use]
    pub fn get() -> Self {
        Self::default()
    }

    /// Options for a POST with a JSON body
    #[must_use]
    pub fn post(body: Value) -> Self {
        Self {
            method: Method::POST,
            body: Some(body),
            ..Self::default()
        }
    }
}

/// One element of a [`ApiClient::batch`] call
#[derive(Debug, Clone)]
pub struct BatchRequest {
    /// Endpoint path, resolved against the client base URL
    pub endpoint: String,
    /// Request options
    pub options: RequestOptions,
    /// Request configuration
    pub config: RequestConfig,
}

impl BatchRequest {
    /// A GET request for `endpoint` with default configuration
    #[must_use]
    pub fn get(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            options: RequestOptions::get(),
            config: RequestConfig::default(),
        }
    }
}

/// Resilient API client
///
/// Clones share the same cache, in-flight table, and circuit breaker.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: Client,
    base_url: Url,
    default_headers: HashMap<String, String>,
    cache_enabled: bool,
    cache: Arc<ResponseCache>,
    inflight: InflightTable,
    breaker: Arc<CircuitBreaker>,
    retry_policy: RetryPolicy,
    shutdown: CancellationToken,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl ApiClient {
    /// Create a new client and start its cache maintenance task
    ///
    /// Must be called from within a tokio runtime (the eviction sweep is a
    /// spawned task governed by the client lifecycle).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the base URL does not parse or the
    /// HTTP client cannot be constructed.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| Error::Config(format!("invalid base URL '{}': {e}", config.base_url)))?;

        let http = Client::builder()
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        let breaker_name = base_url.host_str().unwrap_or("api").to_string();
        let cache = Arc::new(ResponseCache::new());

        let shutdown = CancellationToken::new();
        let sweeper = if config.cache.enabled {
            Some(spawn_sweeper(
                Arc::clone(&cache),
                config.cache.sweep_interval,
                shutdown.clone(),
            ))
        } else {
            None
        };

        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                base_url,
                default_headers: config.default_headers,
                cache_enabled: config.cache.enabled,
                cache,
                inflight: InflightTable::new(),
                breaker: Arc::new(CircuitBreaker::new(
                    &breaker_name,
                    &config.failsafe.circuit_breaker,
                )),
                retry_policy: RetryPolicy::new(&config.failsafe.retry),
                shutdown,
                sweeper: Mutex::new(sweeper),
            }),
        })
    }

    /// Issue a request and deserialize the JSON response
    ///
    /// Applies the breaker gate, cache lookup, in-flight deduplication, and
    /// retry with backoff, in that order. See [`ApiClient::request_value`]
    /// for the untyped variant.
    pub async fn request<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
        config: RequestConfig,
    ) -> Result<T> {
        let value = self.request_value(endpoint, options, config).await?;
        serde_json::from_value(value).map_err(|e| Error::Json(e.to_string()))
    }

    /// Issue a request and return the raw JSON response
    pub async fn request_value(
        &self,
        endpoint: &str,
        options: RequestOptions,
        config: RequestConfig,
    ) -> Result<Value> {
        let span = info_span!(
            "api_request",
            endpoint,
            method = %options.method,
            priority = %config.priority,
        );
        self.request_inner(endpoint, options, config)
            .instrument(span)
            .await
    }

    async fn request_inner(
        &self,
        endpoint: &str,
        options: RequestOptions,
        config: RequestConfig,
    ) -> Result<Value> {
        let inner = &self.inner;

        // Resolve local inputs before the breaker gate: an invalid endpoint
        // or header is a caller bug and must not consume the half-open
        // probe slot
        let url = inner
            .base_url
            .join(endpoint)
            .map_err(|e| Error::Config(format!("invalid endpoint '{endpoint}': {e}")))?;
        let headers = inner.build_headers(&options.headers)?;

        if !inner.breaker.can_proceed() {
            return Err(Error::BreakerOpen(inner.breaker.status_message()));
        }

        let key = ResponseCache::build_key(options.method.as_str(), endpoint, options.body.as_ref());
        let cacheable = inner.cache_enabled && config.cache && options.method == Method::GET;

        if cacheable {
            if let Some(hit) = inner.cache.get(&key) {
                // The gate may have admitted this call as the half-open
                // probe; a cache hit performs no network I/O, so the slot
                // goes back for a caller that will reach the network
                inner.breaker.release_probe();
                debug!(endpoint, "Cache hit");
                return Ok(hit);
            }
        }

        let policy = inner.retry_policy.with_max_retries(config.retry);

        let flight = inner.inflight.join_or_register(&key, || {
            let inner = Arc::clone(inner);
            let endpoint = endpoint.to_string();
            let cache_key = key.clone();
            let method = options.method.clone();
            let body = options.body;

            async move {
                let value = with_retry(&policy, &inner.breaker, &endpoint, || {
                    inner.execute_once(
                        method.clone(),
                        url.clone(),
                        headers.clone(),
                        body.clone(),
                        config.timeout,
                    )
                })
                .await?;

                if cacheable {
                    inner.cache.set(&cache_key, value.clone(), config.ttl);
                }

                Ok(value)
            }
        });

        match flight {
            Flight::Owner(handle) => {
                let result = handle.clone().await;
                // Removed on both success and failure so the key is free
                // for the next request
                inner.inflight.complete(&key, &handle);
                result
            }
            Flight::Joined(handle) => {
                debug!(endpoint, "Joined identical in-flight request");
                handle.await
            }
        }
    }

    /// Issue a set of independent requests concurrently
    ///
    /// Output order matches input order. This is a convenience composition,
    /// not a transaction: the overall call fails if any one request fails,
    /// but siblings are not cancelled and run to settlement.
    pub async fn batch<T: DeserializeOwned>(&self, requests: Vec<BatchRequest>) -> Result<Vec<T>> {
        let calls = requests.into_iter().map(|req| {
            let client = self.clone();
            async move {
                client
                    .request::<T>(&req.endpoint, req.options, req.config)
                    .await
            }
        });
        futures::future::try_join_all(calls).await
    }

    /// Empty the response cache unconditionally (idempotent)
    pub fn clear_cache(&self) {
        self.inner.cache.clear();
    }

    /// Snapshot of cache statistics: entries, byte size, hit rate
    pub fn cache_stats(&self) -> CacheStatsSnapshot {
        self.inner.cache.stats()
    }

    /// Read-only snapshot of the circuit breaker
    pub fn circuit_breaker_status(&self) -> CircuitBreakerStatus {
        self.inner.breaker.status()
    }

    /// Number of requests currently in flight
    pub fn inflight_requests(&self) -> usize {
        self.inner.inflight.len()
    }

    /// Stop the cache maintenance task and wait for it to exit
    ///
    /// Dropping the last clone also cancels the task, but without waiting.
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();
        let handle = self.inner.sweeper.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

impl ClientInner {
    /// Execute a single attempt against the transport
    async fn execute_once(
        &self,
        method: Method,
        url: Url,
        headers: HeaderMap,
        body: Option<Value>,
        timeout: Duration,
    ) -> Result<Value> {
        let mut request = self
            .http
            .request(method, url)
            .headers(headers)
            .timeout(timeout);
        if let Some(body) = &body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::from_reqwest(&e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            let message = match response.text().await {
                Ok(body) if !body.is_empty() => body,
                _ => status.canonical_reason().unwrap_or("unknown").to_string(),
            };
            return Err(Error::Status {
                status: status.as_u16(),
                message,
            });
        }

        response.json().await.map_err(|e| {
            if e.is_decode() {
                Error::Json(e.to_string())
            } else {
                Error::from_reqwest(&e, timeout)
            }
        })
    }

    /// Merge the JSON content type, client defaults, and per-call headers
    ///
    /// Later sources win: per-call headers override client defaults, which
    /// override the implicit `Content-Type: application/json`.
    fn build_headers(&self, extra: &HashMap<String, String>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        for (name, value) in self.default_headers.iter().chain(extra) {
            let header_name: HeaderName = name
                .parse()
                .map_err(|_| Error::Config(format!("invalid header name '{name}'")))?;
            let header_value: HeaderValue = value
                .parse()
                .map_err(|_| Error::Config(format!("invalid value for header '{name}'")))?;
            headers.insert(header_name, header_value);
        }

        Ok(headers)
    }
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn spawn_sweeper(
    cache: Arc<ResponseCache>,
    sweep_interval: Duration,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_interval);
        // The first tick completes immediately; skip it so the first real
        // sweep happens one interval after startup
        interval.tick().await;
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    cache.evict_expired();
                }
                () = token.cancelled() => {
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;

    fn client() -> ApiClient {
        ApiClient::new(ClientConfig {
            base_url: "http://localhost:9".into(),
            ..ClientConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn rejects_unparseable_base_url() {
        let result = ApiClient::new(ClientConfig::default());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn header_merge_prefers_per_call_values() {
        let api = ApiClient::new(ClientConfig {
            base_url: "http://localhost:9".into(),
            default_headers: HashMap::from([("x-app".to_string(), "ea-web".to_string())]),
            ..ClientConfig::default()
        })
        .unwrap();

        let extra = HashMap::from([
            ("x-app".to_string(), "override".to_string()),
            ("content-type".to_string(), "application/json; charset=utf-8".to_string()),
        ]);
        let headers = api.inner.build_headers(&extra).unwrap();

        assert_eq!(headers.get("x-app").unwrap(), "override");
        assert_eq!(
            headers.get(CONTENT_TYPE).unwrap(),
            "application/json; charset=utf-8"
        );
    }

    #[tokio::test]
    async fn invalid_header_name_is_a_config_error() {
        let api = client();
        let extra = HashMap::from([("bad header".to_string(), "value".to_string())]);
        assert!(matches!(
            api.inner.build_headers(&extra),
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn clear_cache_on_empty_cache_is_a_noop() {
        let api = client();
        api.clear_cache();
        api.clear_cache();
        assert_eq!(api.cache_stats().entries, 0);
    }

    #[tokio::test]
    async fn shutdown_stops_the_sweeper() {
        let api = ApiClient::new(ClientConfig {
            base_url: "http://localhost:9".into(),
            cache: CacheConfig {
                sweep_interval: Duration::from_millis(10),
                ..CacheConfig::default()
            },
            ..ClientConfig::default()
        })
        .unwrap();

        api.shutdown().await;
        assert!(api.inner.sweeper.lock().is_none());
    }
}
