//! Request handling and transformation.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) when the client sent none
//! - Capture the per-request context consumed by the gateway stages
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - The context is built once and never mutated; the body is moved out
//!   only by the forwarder

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderName, Method, Request, Uri},
};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Query parameter naming the forward target.
pub const TARGET_PARAM: &str = "url";

/// Generates UUID v4 request IDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

/// Everything the gateway stages need to know about one request.
#[derive(Debug)]
pub struct RequestContext {
    pub request_id: String,
    pub method: Method,
    pub uri: Uri,
    /// The `url` query parameter, if present.
    pub target: Option<String>,
    /// The `Origin` header, empty when absent or not valid UTF-8.
    pub origin: String,
    pub headers: HeaderMap,
    pub body: Body,
}

impl RequestContext {
    pub fn from_request(request: Request<Body>) -> Self {
        let (parts, body) = request.into_parts();

        let request_id = parts
            .headers
            .get(&X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();
        let origin = parts
            .headers
            .get(header::ORIGIN)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let target = target_param(&parts.uri);

        Self {
            request_id,
            method: parts.method,
            uri: parts.uri,
            target,
            origin,
            headers: parts.headers,
            body,
        }
    }
}

/// First `url` query parameter, percent-decoded.
pub fn target_param(uri: &Uri) -> Option<String> {
    let query = uri.query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == TARGET_PARAM)
        .map(|(_, value)| value.into_owned())
}
