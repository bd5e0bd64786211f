//! CORS forwarding gateway library.

pub mod cache;
pub mod config;
pub mod error;
pub mod gateway;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;
pub mod store;
pub mod upstream;

pub use config::schema::GatewayConfig;
pub use gateway::{Collaborators, Gateway};
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
