//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared with the gateway stages at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; allowlists live for the whole process
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    CacheConfig, CorsConfig, GatewayConfig, LifecycleConfig, ListenerConfig, LogFormat,
    ObservabilityConfig, PolicyConfig, RateLimitConfig, UpstreamConfig,
};
