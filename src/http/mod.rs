//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID, RequestContext)
//!     → gateway pipeline
//!     → response.rs (CORS, cache status, buffering)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{RequestContext, X_REQUEST_ID};
pub use server::GatewayServer;
