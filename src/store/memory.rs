//! In-process counter store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use crate::store::{CounterStore, StoreError};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

/// A thread-safe, expiring key-value map.
#[derive(Debug, Clone, Default)]
pub struct MemoryCounterStore {
    inner: Arc<DashMap<String, Entry>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included until swept.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Drop expired entries. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.inner.len();
        self.inner.retain(|_, entry| entry.expires_at > now);
        before.saturating_sub(self.inner.len())
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = Instant::now();
        let value = self
            .inner
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.value.clone());
        if value.is_none() {
            self.inner.remove_if(key, |_, entry| entry.expires_at <= now);
        }
        Ok(value)
    }

    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError> {
        self.inner.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }
}
