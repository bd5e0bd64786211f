//! Per-origin rate limiting over an external counter store.
//!
//! Read-then-write without compare-and-swap: concurrent requests from the
//! same origin may race and miscount within one window. Every accepted
//! request rewrites the counter with a fresh expiry, so sustained traffic
//! keeps extending the window instead of using a calendar bucket.

use std::sync::Arc;

use crate::config::RateLimitConfig;
use crate::error::{GatewayError, Result};
use crate::observability::metrics;
use crate::store::CounterStore;

pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>, config: RateLimitConfig) -> Self {
        Self { store, config }
    }

    /// Store key for an origin's counter.
    pub fn key_for(&self, origin: &str) -> String {
        format!("{}{}", self.config.key_prefix, origin)
    }

    /// Read the current count. Absent, non-numeric, or unreadable values count as 0.
    async fn current(&self, key: &str) -> u64 {
        match self.store.get(key).await {
            Ok(Some(raw)) => raw.trim().parse().unwrap_or(0),
            Ok(None) => 0,
            Err(e) => {
                tracing::warn!(key, error = %e, "Counter read failed, treating as 0");
                metrics::record_store_error("counter_get");
                0
            }
        }
    }

    /// Admit or reject one request from `origin`.
    ///
    /// Returns the count stored for this request. A rejected request leaves
    /// the counter untouched.
    pub async fn check(&self, origin: &str) -> Result<u64> {
        if !self.config.enabled {
            return Ok(0);
        }

        let key = self.key_for(origin);
        let count = self.current(&key).await;

        if count > self.config.max_requests {
            tracing::warn!(origin, count, "Rate limit exceeded");
            return Err(GatewayError::RateLimited {
                origin: origin.to_string(),
                count,
            });
        }

        let next = count + 1;
        if let Err(e) = self
            .store
            .put(&key, next.to_string(), self.config.window())
            .await
        {
            tracing::warn!(key, error = %e, "Counter write failed");
            metrics::record_store_error("counter_put");
        }
        Ok(next)
    }
}
