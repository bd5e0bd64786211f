//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, request deadline).
    pub listener: ListenerConfig,

    /// Origin and target allowlists.
    pub policy: PolicyConfig,

    /// Per-origin rate limiting.
    pub rate_limit: RateLimitConfig,

    /// Shared response cache settings.
    pub cache: CacheConfig,

    /// CORS headers attached to forwarded responses.
    pub cors: CorsConfig,

    /// Outbound HTTP client settings.
    pub upstream: UpstreamConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Startup/shutdown behaviour.
    pub lifecycle: LifecycleConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Hard deadline for a whole request, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 60,
        }
    }
}

/// Allowlists checked by exact string match.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Origins (scheme + host) allowed to use the gateway.
    pub allowed_origins: Vec<String>,

    /// Hostnames the gateway may forward to.
    pub allowed_targets: Vec<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["https://proxy-worker.bitsonline.nl".to_string()],
            allowed_targets: vec!["api.partner.io".to_string(), "data.internal.net".to_string()],
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Requests are rejected once the stored count exceeds this value.
    pub max_requests: u64,

    /// Counter expiry, refreshed on every write.
    pub window_secs: u64,

    /// Prefix of the counter store key; the origin is appended.
    pub key_prefix: String,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 300,
            window_secs: 60,
            key_prefix: "rate-".to_string(),
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Response cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable cache lookups and stores.
    pub enabled: bool,

    /// Freshness lifetime advertised via `Cache-Control: max-age`.
    pub ttl_secs: u64,

    /// Request headers that participate in the cache key.
    pub vary_headers: Vec<String>,

    /// Largest upstream body that will be buffered for storage.
    pub max_body_bytes: usize,

    /// Upper bound on stored responses.
    pub max_entries: usize,

    /// How often expired counters and cache entries are swept.
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 60,
            vary_headers: vec![
                "accept".to_string(),
                "accept-encoding".to_string(),
                "accept-language".to_string(),
                "authorization".to_string(),
            ],
            max_body_bytes: 8 * 1024 * 1024, // 8MB
            max_entries: 10_000,
            sweep_interval_secs: 30,
        }
    }
}

/// CORS header values. The allowed origin is always the validated request origin.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Value of `access-control-allow-headers`.
    pub allow_headers: String,

    /// Value of `access-control-allow-methods`.
    pub allow_methods: String,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_headers: "Origin, X-Requested-With, Content-Type, Accept, Authorization".to_string(),
            allow_methods: "GET, POST, PUT, DELETE, OPTIONS".to_string(),
        }
    }
}

/// Outbound client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Total upstream request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Largest inbound request body forwarded upstream.
    pub max_body_bytes: usize,

    /// Honour HTTP(S)_PROXY environment variables for outbound calls.
    pub use_system_proxy: bool,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 5,
            request_timeout_secs: 30,
            max_body_bytes: 2 * 1024 * 1024, // 2MB
            use_system_proxy: false,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Lifecycle configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Maximum time spent draining background writes on shutdown.
    pub drain_timeout_secs: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            drain_timeout_secs: 10,
        }
    }
}
