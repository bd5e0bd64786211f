//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses, allowlist entries and value ranges
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use axum::http::HeaderValue;
use thiserror::Error;
use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic problem with a configuration value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::new("listener.request_timeout_secs", "must be greater than 0"));
    }

    if config.policy.allowed_origins.is_empty() {
        errors.push(ValidationError::new("policy.allowed_origins", "at least one origin is required"));
    }
    for origin in &config.policy.allowed_origins {
        if let Err(message) = check_origin(origin) {
            errors.push(ValidationError::new("policy.allowed_origins", message));
        }
    }

    if config.policy.allowed_targets.is_empty() {
        errors.push(ValidationError::new("policy.allowed_targets", "at least one target host is required"));
    }
    for target in &config.policy.allowed_targets {
        if let Err(message) = check_target_host(target) {
            errors.push(ValidationError::new("policy.allowed_targets", message));
        }
    }

    if config.rate_limit.max_requests == 0 {
        errors.push(ValidationError::new("rate_limit.max_requests", "must be greater than 0"));
    }
    if config.rate_limit.window_secs == 0 {
        errors.push(ValidationError::new("rate_limit.window_secs", "must be greater than 0"));
    }

    if config.cache.ttl_secs == 0 {
        errors.push(ValidationError::new("cache.ttl_secs", "must be greater than 0"));
    }
    if config.cache.max_entries == 0 {
        errors.push(ValidationError::new("cache.max_entries", "must be greater than 0"));
    }
    if config.cache.sweep_interval_secs == 0 {
        errors.push(ValidationError::new("cache.sweep_interval_secs", "must be greater than 0"));
    }
    for name in &config.cache.vary_headers {
        if axum::http::HeaderName::from_bytes(name.as_bytes()).is_err() {
            errors.push(ValidationError::new(
                "cache.vary_headers",
                format!("'{}' is not a valid header name", name),
            ));
        }
    }

    if HeaderValue::from_str(&config.cors.allow_headers).is_err() {
        errors.push(ValidationError::new("cors.allow_headers", "not a valid header value"));
    }
    if HeaderValue::from_str(&config.cors.allow_methods).is_err() {
        errors.push(ValidationError::new("cors.allow_methods", "not a valid header value"));
    }

    if config.upstream.request_timeout_secs == 0 {
        errors.push(ValidationError::new("upstream.request_timeout_secs", "must be greater than 0"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Origins are compared verbatim against the `Origin` header, so they must
/// look exactly like one: scheme and host, optional port, nothing else.
fn check_origin(origin: &str) -> Result<(), String> {
    let parsed = Url::parse(origin).map_err(|_| format!("'{}' is not a URL", origin))?;
    if parsed.host_str().is_none() {
        return Err(format!("'{}' has no host", origin));
    }
    if origin.ends_with('/') || parsed.path() != "/" || parsed.query().is_some() {
        return Err(format!("'{}' must not carry a path or query", origin));
    }
    Ok(())
}

fn check_target_host(host: &str) -> Result<(), String> {
    if host.is_empty() {
        return Err("empty target host".to_string());
    }
    if host.contains("://") || host.contains('/') {
        return Err(format!("'{}' must be a bare hostname", host));
    }
    if host != host.to_ascii_lowercase() {
        return Err(format!("'{}' must be lowercase", host));
    }
    Ok(())
}
