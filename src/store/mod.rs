//! Counter store abstraction.
//!
//! The rate limiter only ever needs `get` and `put`; the store owns expiry.
//! Values are decimal strings so that any plain key-value backend fits.

pub mod memory;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::MemoryCounterStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("counter store unavailable: {0}")]
    Unavailable(String),
}

/// Key-value store holding per-origin counters.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Current value for `key`, `None` when absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Store `value` under `key`, expiring `ttl` after this write.
    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError>;
}
