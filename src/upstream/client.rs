//! Outbound HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use reqwest::redirect::Policy;

use crate::config::UpstreamConfig;
use crate::error::Result;
use crate::upstream::{OutboundRequest, Upstream, UpstreamResponse};

/// `reqwest`-backed upstream with connection pooling.
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: reqwest::Client,
}

impl HttpUpstream {
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .redirect(Policy::none())
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs));
        if !config.use_system_proxy {
            builder = builder.no_proxy();
        }
        Ok(Self {
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn send(&self, request: OutboundRequest) -> Result<UpstreamResponse> {
        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();

        Ok(UpstreamResponse {
            status,
            headers,
            body: Body::from_stream(response.bytes_stream()),
        })
    }
}
