//! In-process response cache.
//!
//! Bounded by entry count. When full, stale entries are purged first, then
//! the entry closest to expiry is evicted to make room.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use crate::cache::{CacheError, CacheKey, CachedResponse, ResponseCache};

#[derive(Debug, Clone)]
struct Entry {
    response: CachedResponse,
    fresh_until: Instant,
}

pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// A thread-safe response cache with per-entry freshness.
#[derive(Debug, Clone)]
pub struct MemoryResponseCache {
    inner: Arc<DashMap<CacheKey, Entry>>,
    max_entries: usize,
}

impl Default for MemoryResponseCache {
    fn default() -> Self {
        Self::with_max_entries(DEFAULT_MAX_ENTRIES)
    }
}

impl MemoryResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            max_entries: max_entries.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Drop stale entries. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.inner.len();
        self.inner.retain(|_, entry| entry.fresh_until > now);
        before.saturating_sub(self.inner.len())
    }

    /// Make room for one new entry.
    fn make_room(&self) {
        if self.inner.len() < self.max_entries {
            return;
        }
        self.purge_expired();
        while self.inner.len() >= self.max_entries {
            let oldest = self
                .inner
                .iter()
                .min_by_key(|entry| entry.fresh_until)
                .map(|entry| entry.key().clone());
            match oldest {
                Some(key) => {
                    self.inner.remove(&key);
                    tracing::debug!(key = %key, "Evicted cache entry to stay within bound");
                }
                None => break,
            }
        }
    }
}

#[async_trait]
impl ResponseCache for MemoryResponseCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<CachedResponse>, CacheError> {
        let now = Instant::now();
        let hit = self
            .inner
            .get(key)
            .filter(|entry| entry.fresh_until > now)
            .map(|entry| entry.response.clone());
        if hit.is_none() {
            self.inner.remove_if(key, |_, entry| entry.fresh_until <= now);
        }
        Ok(hit)
    }

    async fn put(&self, key: CacheKey, response: CachedResponse) -> Result<(), CacheError> {
        if !response.is_storable() {
            tracing::debug!(key = %key, "Response not storable, skipping");
            return Ok(());
        }
        let Some(max_age) = response.max_age() else {
            return Ok(());
        };
        if !self.inner.contains_key(&key) {
            self.make_room();
        }
        self.inner.insert(
            key,
            Entry {
                response,
                fresh_until: Instant::now() + max_age,
            },
        );
        Ok(())
    }
}
