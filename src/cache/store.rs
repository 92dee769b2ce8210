//! TTL key/value store for decoded response payloads.

use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::observability::metrics;

/// Fraction of the TTL after which a hit triggers background revalidation.
pub const REVALIDATE_RATIO: f64 = 0.8;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    stored_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn age(&self) -> Duration {
        self.stored_at.elapsed()
    }

    fn is_expired(&self) -> bool {
        self.age() >= self.ttl
    }
}

/// A value served from the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheHit {
    pub value: Value,
    pub age: Duration,
    pub ttl: Duration,
}

impl CacheHit {
    /// True once the entry has used up 80% of its lifetime.
    pub fn needs_revalidation(&self) -> bool {
        self.age >= self.ttl.mul_f64(REVALIDATE_RATIO)
    }
}

/// Process-wide response cache, shared by cloning.
#[derive(Debug, Clone, Default)]
pub struct CacheStore {
    inner: Arc<DashMap<String, CacheEntry>>,
}

impl CacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a live entry. Expired entries are removed and reported as a miss.
    pub fn get(&self, key: &str) -> Option<CacheHit> {
        match self.inner.get(key) {
            None => {
                metrics::record_cache("miss");
                return None;
            }
            Some(entry) if !entry.is_expired() => {
                metrics::record_cache("hit");
                return Some(CacheHit {
                    value: entry.value.clone(),
                    age: entry.age(),
                    ttl: entry.ttl,
                });
            }
            Some(_) => {}
        }

        self.inner.remove_if(key, |_, entry| entry.is_expired());
        metrics::record_cache("expired");
        None
    }

    /// Store a value, replacing any previous entry and restarting its age.
    pub fn set(&self, key: impl Into<String>, value: Value, ttl: Duration) {
        let key = key.into();
        tracing::trace!(key = %key, ttl_ms = ttl.as_millis() as u64, "Cache set");
        self.inner.insert(
            key,
            CacheEntry {
                value,
                stored_at: Instant::now(),
                ttl,
            },
        );
    }

    /// Age of a live entry.
    pub fn age(&self, key: &str) -> Option<Duration> {
        self.inner
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.age())
    }

    pub fn remove(&self, key: &str) -> bool {
        self.inner.remove(key).is_some()
    }

    pub fn clear(&self) {
        self.inner.clear();
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.inner.len();
        self.inner.retain(|_, entry| !entry.is_expired());
        let purged = before.saturating_sub(self.inner.len());
        if purged > 0 {
            tracing::debug!(purged, "Purged expired cache entries");
        }
        purged
    }

    /// Number of stored entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Cache key for a URL and its query params.
///
/// `serde_json` maps are ordered, so equal params always serialize the same.
pub fn cache_key(url: &str, params: Option<&Value>) -> String {
    match params {
        None | Some(Value::Null) => url.to_string(),
        Some(params) => format!("{url}#{params}"),
    }
}
