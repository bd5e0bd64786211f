//! Upstream forwarding.
//!
//! # Data Flow
//! ```text
//! RequestContext + ValidatedTarget
//!     → OutboundRequest (sanitized headers, body unless GET/HEAD)
//!     → Upstream::send (single attempt, redirects not followed)
//!     → UpstreamResponse (status, headers, streaming body)
//! ```
//!
//! # Design Decisions
//! - No retries: a transport failure ends the request with a 5xx
//! - 3xx answers are relayed to the client untouched
//! - Inbound bodies are buffered up to a limit before sending

pub mod client;

use async_trait::async_trait;
use axum::{
    body::{Body, Bytes},
    http::{header, HeaderMap, Method, StatusCode},
};
use futures_util::StreamExt;
use url::Url;

use crate::error::{GatewayError, Result};
use crate::security::headers::sanitize_request_headers;
use crate::security::ValidatedTarget;

pub use client::HttpUpstream;

/// The request sent to the target.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl OutboundRequest {
    /// Build the outbound request for an already validated target.
    pub async fn prepare(
        method: Method,
        incoming: &HeaderMap,
        body: Body,
        target: &ValidatedTarget,
        max_body_bytes: usize,
    ) -> Result<Self> {
        let body = if method == Method::GET || method == Method::HEAD {
            None
        } else {
            Some(read_body(incoming, body, max_body_bytes).await?)
        };

        Ok(Self {
            method,
            url: target.url.clone(),
            headers: sanitize_request_headers(incoming),
            body,
        })
    }
}

async fn read_body(headers: &HeaderMap, body: Body, max: usize) -> Result<Bytes> {
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.is_some_and(|len| len > max) {
        return Err(GatewayError::BodyTooLarge { max });
    }

    let mut stream = body.into_data_stream();
    let mut buf: Vec<u8> = Vec::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| GatewayError::BodyUnreadable(e.to_string()))?;
        if buf.len() + chunk.len() > max {
            return Err(GatewayError::BodyTooLarge { max });
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(Bytes::from(buf))
}

/// What the target answered.
#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Body,
}

/// Issues outbound requests.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn send(&self, request: OutboundRequest) -> Result<UpstreamResponse>;
}
