//! Response handling and transformation.
//!
//! # Responsibilities
//! - Turn an upstream answer into the client response (CORS, x-cache-status)
//! - Buffer cacheable bodies so a copy can be stored after responding
//!
//! # Design Decisions
//! - Hop-by-hop headers stripped automatically
//! - Bodies above the cache limit are streamed through untouched and not cached

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::Response,
};
use futures_util::{stream, StreamExt};

use crate::cache::{CacheOutcome, CachedResponse};
use crate::error::{GatewayError, Result};
use crate::security::headers::{set_cache_status, strip_hop_by_hop, CorsHeaders};

/// Rewrite upstream headers for the client: hop-by-hop removed, CORS for
/// `origin` overlaid, `x-cache-status: MISS`.
pub fn finalize_headers(headers: &mut HeaderMap, cors: &CorsHeaders, origin: &str) {
    strip_hop_by_hop(headers);
    cors.apply(headers, origin);
    set_cache_status(headers, CacheOutcome::Miss.as_str());
}

/// Append the freshness directive used by the shared cache.
pub fn append_max_age(headers: &mut HeaderMap, ttl_secs: u64) {
    if let Ok(value) = HeaderValue::from_str(&format!("max-age={ttl_secs}")) {
        headers.append(header::CACHE_CONTROL, value);
    }
}

/// Re-stamp a cached response for the current requester.
pub fn cache_hit(mut cached: CachedResponse, cors: &CorsHeaders, origin: &str) -> Response {
    set_cache_status(&mut cached.headers, CacheOutcome::Hit.as_str());
    cors.apply(&mut cached.headers, origin);
    cached.into_response()
}

/// The bodiless 204 answer to a preflight request.
pub fn preflight(cors: &CorsHeaders, origin: &str) -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::NO_CONTENT;
    *response.headers_mut() = cors.preflight(origin);
    response
}

pub fn build(status: StatusCode, headers: HeaderMap, body: Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

/// Result of trying to read a body into memory.
pub enum Buffered {
    /// Whole body read; safe to clone into the cache.
    Complete(Bytes),
    /// Body exceeded the limit; the returned body replays what was read
    /// and streams the rest.
    TooLarge(Body),
}

/// Read `body` into memory unless it grows beyond `limit` bytes.
pub async fn buffer_body(body: Body, limit: usize) -> Result<Buffered> {
    let mut stream = body.into_data_stream();
    let mut buf: Vec<u8> = Vec::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| GatewayError::UpstreamTransportFailure(e.to_string()))?;
        buf.extend_from_slice(&chunk);
        if buf.len() > limit {
            let prefix = Bytes::from(buf);
            let replay = stream::once(async move { Ok::<_, axum::Error>(prefix) }).chain(stream);
            return Ok(Buffered::TooLarge(Body::from_stream(replay)));
        }
    }

    Ok(Buffered::Complete(Bytes::from(buf)))
}
