//! Error types for request processing.
//!
//! Every variant is terminal for the request that produced it. The
//! `IntoResponse` impl renders the bare plain-text rejection: no CORS headers,
//! since the origin was never validated as safe to echo.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Result type alias for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Failures that end a request early.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The `url` query parameter is absent or empty.
    #[error("missing ?url= parameter")]
    MissingTarget,

    /// The `Origin` header is absent or not allowlisted.
    #[error("origin not allowed: {0:?}")]
    OriginNotAllowed(String),

    /// The target hostname is not allowlisted.
    #[error("target not allowed: {0:?}")]
    TargetNotAllowed(String),

    /// The origin's counter exceeded the configured threshold.
    #[error("rate limit exceeded for origin {origin:?} (count {count})")]
    RateLimited { origin: String, count: u64 },

    /// The inbound body is larger than the forwarding limit.
    #[error("request body too large (max: {max} bytes)")]
    BodyTooLarge { max: usize },

    /// The inbound body stream broke before it was fully read.
    #[error("failed to read request body: {0}")]
    BodyUnreadable(String),

    /// DNS failure, connection refused, reset, or unreadable upstream body.
    #[error("upstream transport failure: {0}")]
    UpstreamTransportFailure(String),

    /// The upstream did not answer within the client timeout.
    #[error("upstream timed out: {0}")]
    UpstreamTimeout(String),
}

impl GatewayError {
    /// Returns the HTTP status code sent to the client.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingTarget => StatusCode::BAD_REQUEST,
            Self::OriginNotAllowed(_) => StatusCode::FORBIDDEN,
            Self::TargetNotAllowed(_) => StatusCode::FORBIDDEN,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::BodyUnreadable(_) => StatusCode::BAD_REQUEST,
            Self::UpstreamTransportFailure(_) => StatusCode::BAD_GATEWAY,
            Self::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Plain-text body for the rejection. Never exposes internal details.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::MissingTarget => "Missing ?url=",
            Self::OriginNotAllowed(_) => "Origin not allowed",
            Self::TargetNotAllowed(_) => "Target not allowed",
            Self::RateLimited { .. } => "Rate limit exceeded",
            Self::BodyTooLarge { .. } => "Request body too large",
            Self::BodyUnreadable(_) => "Request body could not be read",
            Self::UpstreamTransportFailure(_) => "Upstream request failed",
            Self::UpstreamTimeout(_) => "Upstream request timed out",
        }
    }

    /// Short label used for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::MissingTarget => "missing_target",
            Self::OriginNotAllowed(_) => "origin_not_allowed",
            Self::TargetNotAllowed(_) => "target_not_allowed",
            Self::RateLimited { .. } => "rate_limited",
            Self::BodyTooLarge { .. } => "body_too_large",
            Self::BodyUnreadable(_) => "body_unreadable",
            Self::UpstreamTransportFailure(_) => "upstream_transport",
            Self::UpstreamTimeout(_) => "upstream_timeout",
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::UpstreamTimeout(err.to_string())
        } else {
            Self::UpstreamTransportFailure(err.to_string())
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        (self.status_code(), self.user_message()).into_response()
    }
}
