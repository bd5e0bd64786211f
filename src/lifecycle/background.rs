//! Detached background work and its drain on shutdown.
//!
//! # Responsibilities
//! - Spawn fire-and-forget tasks (cache writes, access-log emits)
//! - Track how many are still in flight
//! - Let shutdown wait for them, bounded by a deadline

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

use crate::observability::metrics;

/// Supervisor for detached tasks. Cheap to clone; clones share the count.
#[derive(Debug, Clone, Default)]
pub struct BackgroundTasks {
    in_flight: Arc<AtomicU64>,
    idle: Arc<Notify>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` without making the caller wait for it.
    pub fn spawn<F>(&self, name: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let guard = self.track();
        tokio::spawn(async move {
            let _guard = guard;
            task.await;
            tracing::trace!(task = name, "Background task finished");
        });
    }

    fn track(&self) -> TaskGuard {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::record_background_tasks(now);
        TaskGuard {
            in_flight: Arc::clone(&self.in_flight),
            idle: Arc::clone(&self.idle),
        }
    }

    /// Number of tasks not yet finished.
    pub fn in_flight(&self) -> u64 {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Wait until every task has finished or `timeout` elapses.
    /// Returns `true` when fully drained.
    pub async fn drain(&self, timeout: Duration) -> bool {
        let wait = async {
            loop {
                let notified = self.idle.notified();
                if self.in_flight() == 0 {
                    return;
                }
                notified.await;
            }
        };
        match tokio::time::timeout(timeout, wait).await {
            Ok(()) => true,
            Err(_) => {
                tracing::warn!(in_flight = self.in_flight(), "Background drain timed out");
                false
            }
        }
    }
}

/// Decrements the in-flight count when the task ends, even by panic.
struct TaskGuard {
    in_flight: Arc<AtomicU64>,
    idle: Arc<Notify>,
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        let remaining = self.in_flight.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::record_background_tasks(remaining);
        if remaining == 0 {
            self.idle.notify_waiters();
        }
    }
}
