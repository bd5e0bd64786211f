//! Periodic removal of expired counters and stale cache entries.

use std::sync::Arc;
use std::time::Duration;

use tokio::time;

use crate::cache::MemoryResponseCache;
use crate::lifecycle::ShutdownSignal;
use crate::store::MemoryCounterStore;

pub struct Sweeper {
    counters: Arc<MemoryCounterStore>,
    cache: Arc<MemoryResponseCache>,
    interval: Duration,
}

impl Sweeper {
    pub fn new(
        counters: Arc<MemoryCounterStore>,
        cache: Arc<MemoryResponseCache>,
        interval: Duration,
    ) -> Self {
        Self {
            counters,
            cache,
            interval,
        }
    }

    /// One pass over both stores. Returns (counters removed, cache entries removed).
    pub fn sweep_once(&self) -> (usize, usize) {
        let counters = self.counters.purge_expired();
        let entries = self.cache.purge_expired();
        if counters > 0 || entries > 0 {
            tracing::debug!(
                counters_removed = counters,
                cache_entries_removed = entries,
                counters_left = self.counters.len(),
                cache_entries_left = self.cache.len(),
                "Swept expired entries"
            );
        }
        (counters, entries)
    }

    pub async fn run(self, mut shutdown: ShutdownSignal) {
        tracing::info!(interval_secs = self.interval.as_secs(), "Store sweeper starting");
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep_once();
                }
                _ = shutdown.recv() => {
                    tracing::info!("Store sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
