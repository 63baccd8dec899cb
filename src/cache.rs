//! Time-boxed response cache shared by every upstream accessor.
//!
//! Entries are type-erased `Arc` payloads with a per-entry TTL. Expiry is lazy:
//! a stale entry is evicted by the read that notices it, and nothing sweeps the
//! map in the background. Keys are limited to the directory plus per-country
//! detail and enrichment entries, so the map stays bounded by the directory size.

use dashmap::DashMap;
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

type Payload = Arc<dyn Any + Send + Sync>;

struct CacheEntry {
    payload: Payload,
    created_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_valid(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) < self.ttl
    }
}

/// Cheaply cloneable handle; clones share the same underlying map.
#[derive(Clone, Default)]
pub struct ResponseCache {
    entries: Arc<DashMap<String, CacheEntry>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key` for `ttl`, replacing any previous entry.
    ///
    /// Returns the shared handle so callers can hand the value on without a
    /// second lookup.
    pub fn set<T: Send + Sync + 'static>(
        &self,
        key: impl Into<String>,
        value: T,
        ttl: Duration,
    ) -> Arc<T> {
        let value = Arc::new(value);
        self.entries.insert(
            key.into(),
            CacheEntry {
                payload: value.clone(),
                created_at: Instant::now(),
                ttl,
            },
        );
        value
    }

    /// Return the cached value if it is present, fresh, and of type `T`.
    ///
    /// A stale entry is removed as a side effect. An entry stored under a
    /// different type is reported as absent but left in place.
    pub fn get<T: Send + Sync + 'static>(&self, key: &str) -> Option<Arc<T>> {
        let now = Instant::now();
        let fresh = match self.entries.get(key) {
            None => return None,
            Some(entry) if entry.is_valid(now) => Some(entry.payload.clone()),
            Some(_) => None,
        };

        match fresh {
            Some(payload) => payload.downcast::<T>().ok(),
            None => {
                // Re-check under the shard lock: a concurrent `set` may have refreshed it.
                self.entries.remove_if(key, |_, entry| !entry.is_valid(now));
                trace!(key, "evicted expired cache entry");
                None
            }
        }
    }

    pub fn remove(&self, key: &str) {
        self.entries.remove(key);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of stored entries, including expired ones not yet read.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
