//! Header manipulation and CORS headers.
//!
//! # Responsibilities
//! - Strip client-identifying headers before forwarding
//! - Strip hop-by-hop headers in both directions
//! - Overlay CORS headers for the validated origin
//!
//! # Design Decisions
//! - The upstream never learns who the client is or which page sent it
//! - `host` and `content-length` are recomputed by the outbound client
//! - CORS values are parsed once at startup, the origin is echoed per request

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

use crate::config::CorsConfig;

pub const ACCESS_CONTROL_ALLOW_ORIGIN: &str = "access-control-allow-origin";
pub const ACCESS_CONTROL_ALLOW_HEADERS: &str = "access-control-allow-headers";
pub const ACCESS_CONTROL_ALLOW_METHODS: &str = "access-control-allow-methods";
pub const X_CACHE_STATUS: &str = "x-cache-status";

/// Headers identifying the client or its proxy chain.
pub const CLIENT_IDENTIFYING_HEADERS: &[&str] = &[
    "origin",
    "referer",
    "cf-connecting-ip",
    "x-real-ip",
    "x-forwarded-for",
];

/// Hop-by-hop headers that must not be forwarded.
pub const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
];

/// Check if a header is a hop-by-hop header.
pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP_HEADERS.contains(&name)
}

/// Build the header set sent upstream from the incoming one.
pub fn sanitize_request_headers(incoming: &HeaderMap) -> HeaderMap {
    let mut headers = incoming.clone();
    for name in CLIENT_IDENTIFYING_HEADERS.iter().chain(HOP_BY_HOP_HEADERS) {
        headers.remove(*name);
    }
    headers.remove(header::HOST);
    headers.remove(header::CONTENT_LENGTH);
    headers
}

/// Drop hop-by-hop headers from an upstream response before relaying it.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP_HEADERS {
        headers.remove(*name);
    }
}

/// Set `x-cache-status`, replacing any previous value.
pub fn set_cache_status(headers: &mut HeaderMap, status: &'static str) {
    headers.insert(
        HeaderName::from_static(X_CACHE_STATUS),
        HeaderValue::from_static(status),
    );
}

/// Pre-parsed CORS header values.
#[derive(Debug, Clone)]
pub struct CorsHeaders {
    allow_headers: HeaderValue,
    allow_methods: HeaderValue,
}

impl CorsHeaders {
    pub fn new(config: &CorsConfig) -> Self {
        let defaults = CorsConfig::default();
        let parse = |value: &str, fallback: &str| {
            HeaderValue::from_str(value).unwrap_or_else(|_| {
                tracing::warn!(value, "Invalid CORS header value, using default");
                HeaderValue::from_str(fallback).unwrap_or(HeaderValue::from_static("*"))
            })
        };
        Self {
            allow_headers: parse(&config.allow_headers, &defaults.allow_headers),
            allow_methods: parse(&config.allow_methods, &defaults.allow_methods),
        }
    }

    /// Overlay the CORS headers for `origin`, replacing existing values.
    pub fn apply(&self, headers: &mut HeaderMap, origin: &str) {
        match HeaderValue::from_str(origin) {
            Ok(value) => {
                headers.insert(HeaderName::from_static(ACCESS_CONTROL_ALLOW_ORIGIN), value);
            }
            Err(_) => {
                // Origins arrive as header values, so this only happens for
                // callers bypassing the validator.
                tracing::warn!(origin, "Origin is not a valid header value");
                headers.remove(ACCESS_CONTROL_ALLOW_ORIGIN);
            }
        }
        headers.insert(
            HeaderName::from_static(ACCESS_CONTROL_ALLOW_HEADERS),
            self.allow_headers.clone(),
        );
        headers.insert(
            HeaderName::from_static(ACCESS_CONTROL_ALLOW_METHODS),
            self.allow_methods.clone(),
        );
    }

    /// Header set for a preflight answer.
    pub fn preflight(&self, origin: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        self.apply(&mut headers, origin);
        headers
    }
}

impl Default for CorsHeaders {
    fn default() -> Self {
        Self::new(&CorsConfig::default())
    }
}
