//! Time-bounded result cache.
//!
//! Each [`TimedCache`] holds the last successful result per key together with
//! the instant it was fetched. A read is a hit only while
//! `now - fetched_at < window`; stale entries are ignored until the next
//! successful fetch overwrites them. Failed fetches never touch the cache, so
//! a retry after a failure always goes upstream.
//!
//! Storage is a [`moka`] cache whose time-to-live equals the window, which
//! keeps memory bounded without a sweeper of our own.

use std::time::{Duration, Instant};

use moka::future::Cache;

/// Upper bound on distinct keys held per cache.
pub const DEFAULT_CAPACITY: u64 = 256;

/// A cached value and the moment it was fetched.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub fetched_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_fresh(&self, window: Duration) -> bool {
        self.fetched_at.elapsed() < window
    }
}

/// Per-key store of the last successful result, served within a freshness window.
#[derive(Clone)]
pub struct TimedCache<V> {
    entries: Cache<String, CacheEntry<V>>,
    window: Duration,
}

impl<V> TimedCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(window: Duration) -> Self {
        Self::with_capacity(window, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(window: Duration, capacity: u64) -> Self {
        let entries = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(window)
            .build();

        Self { entries, window }
    }

    /// Returns the cached value if one exists and is still fresh.
    pub async fn get(&self, key: &str) -> Option<V> {
        let entry = self.entries.get(key).await?;
        if entry.is_fresh(self.window) {
            Some(entry.value)
        } else {
            None
        }
    }

    /// Overwrites the entry for `key`, stamping it with the current instant.
    pub async fn put(&self, key: impl Into<String>, value: V) {
        let entry = CacheEntry {
            value,
            fetched_at: Instant::now(),
        };
        self.entries.insert(key.into(), entry).await;
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Approximate number of live entries.
    pub fn entry_count(&self) -> u64 {
        self.entries.entry_count()
    }
}
