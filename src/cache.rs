//! Tiered result cache for search responses.
//!
//! Serialized [`crate::types::SearchResponse`] payloads are cached under a
//! deterministic key derived from the normalised query, the search type,
//! and the filters. TTL is tiered by volatility: identifier lookups return
//! stable registry metadata and live for tens of days, free-text results
//! for hours (see [`crate::SearchConfig::ttl_for`]).
//!
//! The store is owned by the pipeline and passed by handle — no process
//! globals. Cache failure never fails a search: reads degrade to misses,
//! writes are best-effort.

use crate::error::{Result, SearchError};
use crate::types::{QueryFilters, SearchType};
use async_trait::async_trait;
use moka::Expiry;
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Maximum number of cached responses held in memory.
const MAX_CACHE_ENTRIES: u64 = 1024;

/// Process-lifetime cache counters, updated atomically on every operation.
#[derive(Debug, Default)]
pub struct CacheMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    errors: AtomicU64,
}

impl CacheMetrics {
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_set(&self) {
        self.sets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Consistent-enough point-in-time view of the counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of [`CacheMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub errors: u64,
}

impl MetricsSnapshot {
    /// `hits / (hits + misses)`, or 0.0 before any lookup.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64
    }
}

/// A keyed, TTL-aware store for serialized search responses.
///
/// Any key-value store with per-entry TTL qualifies; the pipeline ships
/// with the in-memory [`MemoryCache`]. Implementations count every
/// operation in their metrics.
#[async_trait]
pub trait SearchCache: Send + Sync {
    /// Look up a cached payload. `Ok(None)` is a miss.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store a payload under `key` for `ttl`.
    async fn set(&self, key: &str, payload: Vec<u8>, ttl: Duration) -> Result<()>;

    /// Current counter values.
    fn metrics(&self) -> MetricsSnapshot;

    /// Release resources and log the final metrics.
    async fn close(&self);
}

/// Cached value plus the TTL tier it was stored with.
#[derive(Clone)]
struct CachedPayload {
    bytes: Arc<Vec<u8>>,
    ttl: Duration,
}

/// Moka expiry policy reading each entry's own TTL.
struct PerEntryTtl;

impl Expiry<String, CachedPayload> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CachedPayload,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-memory TTL cache backed by [`moka`].
///
/// Construct one per pipeline; clones of the handle share the same store.
pub struct MemoryCache {
    inner: moka::future::Cache<String, CachedPayload>,
    metrics: CacheMetrics,
}

impl MemoryCache {
    /// Create a cache holding at most [`MAX_CACHE_ENTRIES`] responses.
    pub fn new() -> Self {
        Self::with_capacity(MAX_CACHE_ENTRIES)
    }

    /// Create a cache with an explicit entry capacity.
    pub fn with_capacity(max_entries: u64) -> Self {
        let inner = moka::future::Cache::builder()
            .max_capacity(max_entries)
            .expire_after(PerEntryTtl)
            .build();
        Self {
            inner,
            metrics: CacheMetrics::default(),
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match self.inner.get(key).await {
            Some(entry) => {
                self.metrics.record_hit();
                Ok(Some(entry.bytes.as_ref().clone()))
            }
            None => {
                self.metrics.record_miss();
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, payload: Vec<u8>, ttl: Duration) -> Result<()> {
        if ttl.is_zero() {
            self.metrics.record_error();
            return Err(SearchError::Cache("refusing zero TTL".into()));
        }
        self.inner
            .insert(
                key.to_string(),
                CachedPayload {
                    bytes: Arc::new(payload),
                    ttl,
                },
            )
            .await;
        self.metrics.record_set();
        Ok(())
    }

    fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    async fn close(&self) {
        let snapshot = self.metrics.snapshot();
        tracing::info!(
            hits = snapshot.hits,
            misses = snapshot.misses,
            sets = snapshot.sets,
            errors = snapshot.errors,
            hit_rate = snapshot.hit_rate(),
            "search cache closed"
        );
    }
}

/// Build a deterministic cache key from the query, its routing, and filters.
///
/// The query text is trimmed, lowercased, and whitespace-collapsed before
/// hashing, so `" RNA-seq  diabetes "` and `"rna-seq diabetes"` share an
/// entry. The key is a pure function of its inputs: identical inputs yield
/// identical keys across calls and process restarts.
pub fn cache_key(raw_query: &str, search_type: SearchType, filters: &QueryFilters) -> String {
    let normalized = normalize_query(raw_query);
    let canonical = format!(
        "v1|{}|{}|org={}|type={}|min_samples={}",
        search_type.name(),
        normalized,
        filters.organism.as_deref().unwrap_or(""),
        filters.record_type.as_deref().unwrap_or(""),
        filters
            .min_sample_count
            .map(|n| n.to_string())
            .unwrap_or_default(),
    );

    let digest = Sha256::digest(canonical.as_bytes());
    let mut key = String::with_capacity(digest.len() * 2);
    for byte in digest {
        // Infallible for String.
        let _ = write!(key, "{byte:02x}");
    }
    key
}

/// Trim, lowercase, and collapse runs of whitespace to single spaces.
fn normalize_query(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
