//! Shared response cache.
//!
//! # Data Flow
//! ```text
//! request → key.rs (method + URL + vary headers) → ResponseCache::get
//!     hit  → stored response, re-stamped HIT + CORS
//!     miss → forward upstream → finalize → ResponseCache::put (background)
//! ```
//!
//! # Design Decisions
//! - Only buffered, successful GET responses are stored
//! - Freshness comes from the stored response's `Cache-Control: max-age`
//! - Read failures degrade to a miss

pub mod key;
pub mod memory;

use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{Body, Bytes},
    http::{header, HeaderMap, StatusCode},
    response::Response,
};
use thiserror::Error;

pub use key::CacheKey;
pub use memory::MemoryResponseCache;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("response cache unavailable: {0}")]
    Unavailable(String),
}

/// Where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    Hit,
    Miss,
}

impl CacheOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheOutcome::Hit => "HIT",
            CacheOutcome::Miss => "MISS",
        }
    }
}

impl std::fmt::Display for CacheOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully buffered response.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl CachedResponse {
    /// Freshness lifetime from the last `max-age` directive, if any.
    pub fn max_age(&self) -> Option<Duration> {
        self.cache_directives()
            .filter_map(|d| d.strip_prefix("max-age=").and_then(|v| v.parse::<u64>().ok()))
            .last()
            .map(Duration::from_secs)
    }

    /// Whether the response may be kept at all.
    pub fn is_storable(&self) -> bool {
        let forbidden = self
            .cache_directives()
            .any(|d| d == "no-store" || d == "private");
        !forbidden && self.max_age().is_some_and(|age| !age.is_zero())
    }

    fn cache_directives(&self) -> impl Iterator<Item = String> + '_ {
        self.headers
            .get_all(header::CACHE_CONTROL)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .map(|d| d.trim().to_ascii_lowercase())
    }

    pub fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// A shared cache of finalized responses.
#[async_trait]
pub trait ResponseCache: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Result<Option<CachedResponse>, CacheError>;

    async fn put(&self, key: CacheKey, response: CachedResponse) -> Result<(), CacheError>;
}
