//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Gateway stages produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!     → access_log.rs (one event per served request, to a LogSink)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through all log lines of a request
//! - Access-log writes never affect the response

pub mod access_log;
pub mod logging;
pub mod metrics;

pub use access_log::{AccessLogEvent, LogSink, SinkError, TracingLogSink};
