//! Response caching with per-entry TTL
//!
//! Provides a thread-safe, TTL-based cache for API responses. Cache keys are
//! computed from `method:endpoint:body_hash` where `body_hash` is the SHA-256
//! digest of the serialized request body, so two logically identical requests
//! always map to the same key. The same key is used for in-flight
//! deduplication (see [`crate::inflight`]).

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::debug;

/// Thread-safe response cache with TTL expiry
pub struct ResponseCache {
    /// Cache entries keyed by `method:endpoint:body_hash`
    entries: DashMap<String, CachedResponse>,
    /// Cache statistics
    stats: CacheStats,
}

/// A cached response with TTL metadata
struct CachedResponse {
    /// The cached JSON value
    value: Value,
    /// When this entry was cached
    cached_at: Instant,
    /// Time-to-live duration
    ttl: Duration,
    /// Serialized byte length of the payload, recorded at insert
    size_bytes: usize,
}

impl CachedResponse {
    /// An entry is valid iff its age has not exceeded its TTL.
    fn is_expired(&self) -> bool {
        self.cached_at.elapsed() > self.ttl
    }
}

/// Cache statistics tracked atomically
#[derive(Debug)]
struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl CacheStats {
    fn new() -> Self {
        Self {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Hit rate over the cache lifetime (0.0-1.0); 0 before any lookup.
    #[allow(clippy::cast_precision_loss)]
    fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let total = hits + self.misses.load(Ordering::Relaxed);
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

impl ResponseCache {
    /// Create a new empty cache
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            stats: CacheStats::new(),
        }
    }

    /// Get a cached response if it exists and hasn't expired
    ///
    /// Returns `None` if the key doesn't exist or the entry has expired.
    /// Expired entries are evicted on access.
    pub fn get(&self, key: &str) -> Option<Value> {
        if let Some(entry) = self.entries.get(key) {
            if entry.is_expired() {
                drop(entry);
                self.entries.remove(key);
                self.stats.evictions.fetch_add(1, Ordering::Relaxed);
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                None
            } else {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value.clone())
            }
        } else {
            self.stats.misses.fetch_add(1, Ordering::Relaxed);
            None
        }
    }

    /// Store a value in the cache with the given TTL
    ///
    /// The serialized byte length of the payload is recorded for the
    /// size figure reported by [`ResponseCache::stats`].
    pub fn set(&self, key: &str, value: Value, ttl: Duration) {
        let size_bytes = serde_json::to_string(&value).map_or(0, |s| s.len());
        let entry = CachedResponse {
            value,
            cached_at: Instant::now(),
            ttl,
            size_bytes,
        };
        self.entries.insert(key.to_string(), entry);
    }

    /// Get a snapshot of cache statistics
    pub fn stats(&self) -> CacheStatsSnapshot {
        let size_bytes = self.entries.iter().map(|e| e.value().size_bytes).sum();
        CacheStatsSnapshot {
            entries: self.entries.len(),
            size_bytes,
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            evictions: self.stats.evictions.load(Ordering::Relaxed),
            hit_rate: self.stats.hit_rate(),
        }
    }

    /// Build a cache key from HTTP method, endpoint, and serialized body
    ///
    /// The key format is `{method}:{endpoint}:{body_hash}` where `body_hash`
    /// is the SHA-256 hex digest of the serialized body (or of the empty
    /// string when there is none).
    #[must_use]
    pub fn build_key(method: &str, endpoint: &str, body: Option<&Value>) -> String {
        let serialized = body
            .map(|b| serde_json::to_string(b).unwrap_or_default())
            .unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(serialized.as_bytes());
        let digest = hasher.finalize();
        format!("{method}:{endpoint}:{digest:x}")
    }

    /// Clear all cached entries
    ///
    /// Idempotent; clearing an empty cache is a no-op.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Evict expired entries (background maintenance)
    ///
    /// Called by the periodic sweep so entries that are written but never
    /// re-read don't accumulate.
    pub fn evict_expired(&self) {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        let evicted = before.saturating_sub(self.entries.len());

        if evicted > 0 {
            self.stats
                .evictions
                .fetch_add(evicted as u64, Ordering::Relaxed);
            debug!(evicted, remaining = self.entries.len(), "Cache sweep");
        }
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of cache statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct CacheStatsSnapshot {
    /// Current number of entries
    pub entries: usize,
    /// Total serialized byte length of cached payloads
    pub size_bytes: usize,
    /// Total cache hits
    pub hits: u64,
    /// Total cache misses
    pub misses: u64,
    /// Total evictions
    pub evictions: u64,
    /// Hit rate (0.0-1.0)
    pub hit_rate: f64,
}
