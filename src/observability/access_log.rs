//! Access-log events and the sink they are written to.
//!
//! Events are write-once and fire-and-forget. A sink failure is counted and
//! logged, never propagated to the response path.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::cache::CacheOutcome;
use crate::observability::metrics;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to encode access-log event: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("access-log sink unavailable: {0}")]
    Unavailable(String),
}

/// One served request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessLogEvent {
    pub origin: String,
    pub target: String,
    pub method: String,
    pub status: u16,
    pub cache: CacheOutcome,
}

/// Analytics row layout: string dimensions and numeric measures.
#[derive(Debug, Serialize)]
pub struct DataPoint<'a> {
    pub blobs: [&'a str; 5],
    pub doubles: [f64; 1],
}

impl AccessLogEvent {
    /// Status as the textual blob dimension.
    pub fn status_text(&self) -> String {
        self.status.to_string()
    }

    pub fn to_data_point<'a>(&'a self, status_text: &'a str) -> DataPoint<'a> {
        DataPoint {
            blobs: [
                self.origin.as_str(),
                self.target.as_str(),
                self.method.as_str(),
                status_text,
                self.cache.as_str(),
            ],
            doubles: [f64::from(self.status)],
        }
    }
}

/// Write-only destination for access-log events.
#[async_trait]
pub trait LogSink: Send + Sync {
    async fn emit(&self, event: &AccessLogEvent) -> Result<(), SinkError>;
}

/// Writes each event as a structured `tracing` record on the `access_log` target.
#[derive(Debug, Clone, Default)]
pub struct TracingLogSink;

#[async_trait]
impl LogSink for TracingLogSink {
    async fn emit(&self, event: &AccessLogEvent) -> Result<(), SinkError> {
        let status_text = event.status_text();
        let data_point = serde_json::to_string(&event.to_data_point(&status_text))?;
        tracing::info!(
            target: "access_log",
            origin = %event.origin,
            target_url = %event.target,
            method = %event.method,
            status = event.status,
            cache = %event.cache,
            data_point = %data_point,
            "request served"
        );
        Ok(())
    }
}

/// Emit `event`, swallowing any sink failure.
pub async fn emit_quietly(sink: Arc<dyn LogSink>, event: AccessLogEvent) {
    if let Err(e) = sink.emit(&event).await {
        metrics::record_log_sink_failure();
        tracing::warn!(error = %e, origin = %event.origin, "Log write failed");
    }
}
