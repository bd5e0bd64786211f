//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → access_control.rs (url parameter, origin and target allowlists)
//!     → rate_limit.rs (per-origin counter)
//!     → headers.rs (strip client-identifying headers before forwarding)
//!
//! Outgoing response:
//!     → headers.rs (CORS overlay, x-cache-status)
//! ```
//!
//! # Design Decisions
//! - Fail closed on policy: exact-match allowlists, no wildcards
//! - Rejections carry no CORS headers
//! - The rate limiter fails open when its store is unavailable

pub mod access_control;
pub mod headers;
pub mod rate_limit;

pub use access_control::{AccessPolicy, ValidatedTarget};
pub use headers::CorsHeaders;
pub use rate_limit::RateLimiter;
