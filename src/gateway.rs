//! The request pipeline.
//!
//! ```text
//! validate ─┬─ 400/403 (bare)
//!           ├─ OPTIONS → 204 + CORS
//!           └─ rate-limit ─┬─ 429 (bare)
//!                          └─ cache ─┬─ HIT → stored response + CORS
//!                                    └─ forward ─┬─ 5xx on transport failure
//!                                                └─ finalize → upstream status + CORS (MISS)
//! ```
//!
//! Each stage runs once; nothing is retried. Cache stores and access-log
//! emits are detached onto [`BackgroundTasks`] so the response never waits.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
};

use crate::cache::{CacheKey, CacheOutcome, CachedResponse, ResponseCache};
use crate::config::{CacheConfig, GatewayConfig};
use crate::error::Result;
use crate::http::request::RequestContext;
use crate::http::response::{self, Buffered};
use crate::lifecycle::BackgroundTasks;
use crate::observability::access_log::{emit_quietly, AccessLogEvent, LogSink};
use crate::observability::metrics;
use crate::security::{AccessPolicy, CorsHeaders, RateLimiter, ValidatedTarget};
use crate::store::CounterStore;
use crate::upstream::{OutboundRequest, Upstream, UpstreamResponse};

/// External collaborators the pipeline talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub counters: Arc<dyn CounterStore>,
    pub cache: Arc<dyn ResponseCache>,
    pub sink: Arc<dyn LogSink>,
    pub upstream: Arc<dyn Upstream>,
}

/// How a response was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Served {
    Preflight,
    Cache(CacheOutcome),
}

impl Served {
    fn label(self) -> &'static str {
        match self {
            Served::Preflight => "PREFLIGHT",
            Served::Cache(outcome) => outcome.as_str(),
        }
    }
}

pub struct Gateway {
    policy: AccessPolicy,
    limiter: RateLimiter,
    cors: CorsHeaders,
    cache_config: CacheConfig,
    max_request_body: usize,
    cache: Arc<dyn ResponseCache>,
    sink: Arc<dyn LogSink>,
    upstream: Arc<dyn Upstream>,
    background: BackgroundTasks,
}

impl Gateway {
    pub fn new(config: &GatewayConfig, collaborators: Collaborators, background: BackgroundTasks) -> Self {
        Self {
            policy: AccessPolicy::new(&config.policy),
            limiter: RateLimiter::new(collaborators.counters, config.rate_limit.clone()),
            cors: CorsHeaders::new(&config.cors),
            cache_config: config.cache.clone(),
            max_request_body: config.upstream.max_body_bytes,
            cache: collaborators.cache,
            sink: collaborators.sink,
            upstream: collaborators.upstream,
            background,
        }
    }

    pub fn background(&self) -> &BackgroundTasks {
        &self.background
    }

    /// Serve one request. Never fails: every error becomes a response.
    pub async fn handle(&self, ctx: RequestContext) -> Response {
        let start = Instant::now();
        let method = ctx.method.clone();
        let request_id = ctx.request_id.clone();

        let (response, label) = match self.process(ctx).await {
            Ok((response, served)) => (response, served.label()),
            Err(err) => {
                tracing::debug!(request_id = %request_id, error = %err, "Request rejected");
                metrics::record_rejection(err.reason());
                (err.into_response(), "NONE")
            }
        };

        metrics::record_request(method.as_str(), response.status().as_u16(), label, start);
        response
    }

    async fn process(&self, ctx: RequestContext) -> Result<(Response, Served)> {
        // 1. Validate
        let target = self.policy.validate(ctx.target.as_deref(), &ctx.origin)?;

        if ctx.method == Method::OPTIONS {
            tracing::debug!(request_id = %ctx.request_id, origin = %target.origin, "Answering preflight");
            return Ok((response::preflight(&self.cors, &target.origin), Served::Preflight));
        }

        // 2. Rate limit
        let count = self.limiter.check(&target.origin).await?;

        // 3. Cache lookup
        let key = CacheKey::new(&ctx.method, &ctx.uri, &ctx.headers, &self.cache_config.vary_headers);
        if self.cache_config.enabled {
            if let Some(cached) = self.lookup(&key).await {
                tracing::debug!(request_id = %ctx.request_id, key = %key, "Cache hit");
                self.log(&target, ctx.method.as_str(), StatusCode::OK.as_u16(), CacheOutcome::Hit);
                let response = response::cache_hit(cached, &self.cors, &target.origin);
                return Ok((response, Served::Cache(CacheOutcome::Hit)));
            }
        }

        tracing::debug!(
            request_id = %ctx.request_id,
            method = %ctx.method,
            target = %target.url,
            count,
            "Forwarding request"
        );

        // 4. Forward
        let method = ctx.method.clone();
        let outbound =
            OutboundRequest::prepare(ctx.method, &ctx.headers, ctx.body, &target, self.max_request_body).await?;
        let upstream = match self.upstream.send(outbound).await {
            Ok(upstream) => upstream,
            Err(err) => {
                tracing::error!(request_id = %ctx.request_id, target = %target.url, error = %err, "Upstream error");
                return Err(err);
            }
        };

        // 5. Finalize
        let response = self.finalize(&method, &target, key, upstream).await?;
        Ok((response, Served::Cache(CacheOutcome::Miss)))
    }

    async fn lookup(&self, key: &CacheKey) -> Option<CachedResponse> {
        match self.cache.get(key).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cache read failed, treating as miss");
                metrics::record_store_error("cache_get");
                None
            }
        }
    }

    async fn finalize(
        &self,
        method: &Method,
        target: &ValidatedTarget,
        key: CacheKey,
        upstream: UpstreamResponse,
    ) -> Result<Response> {
        let UpstreamResponse {
            status,
            mut headers,
            body,
        } = upstream;
        response::finalize_headers(&mut headers, &self.cors, &target.origin);

        if !(self.cache_config.enabled && *method == Method::GET && status.is_success()) {
            self.log(target, method.as_str(), status.as_u16(), CacheOutcome::Miss);
            return Ok(response::build(status, headers, body));
        }

        response::append_max_age(&mut headers, self.cache_config.ttl_secs);
        // A body that breaks while buffering becomes a 502, which is not logged.
        let buffered = response::buffer_body(body, self.cache_config.max_body_bytes).await?;
        self.log(target, method.as_str(), status.as_u16(), CacheOutcome::Miss);
        match buffered {
            Buffered::Complete(bytes) => {
                let copy = CachedResponse {
                    status,
                    headers: headers.clone(),
                    body: bytes.clone(),
                };
                self.store(key, copy);
                Ok(response::build(status, headers, Body::from(bytes)))
            }
            Buffered::TooLarge(body) => {
                tracing::debug!(key = %key, "Response too large to cache");
                Ok(response::build(status, headers, body))
            }
        }
    }

    fn store(&self, key: CacheKey, copy: CachedResponse) {
        let cache = Arc::clone(&self.cache);
        self.background.spawn("cache_put", async move {
            match cache.put(key, copy).await {
                Ok(()) => metrics::record_cache_store(),
                Err(e) => {
                    tracing::warn!(error = %e, "Cache write failed");
                    metrics::record_store_error("cache_put");
                }
            }
        });
    }

    fn log(&self, target: &ValidatedTarget, method: &str, status: u16, cache: CacheOutcome) {
        let event = AccessLogEvent {
            origin: target.origin.clone(),
            target: target.raw.clone(),
            method: method.to_string(),
            status,
            cache,
        };
        self.background
            .spawn("access_log", emit_quietly(Arc::clone(&self.sink), event));
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::cache::MemoryResponseCache;
    use crate::error::GatewayError;
    use crate::observability::access_log::SinkError;
    use crate::security::headers::{ACCESS_CONTROL_ALLOW_ORIGIN, X_CACHE_STATUS};
    use crate::store::MemoryCounterStore;
    use async_trait::async_trait;
    use axum::body::Bytes;
    use axum::http::{HeaderMap, Request};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    pub const ORIGIN: &str = "https://proxy-worker.bitsonline.nl";
    pub const TARGET: &str = "https://api.partner.io/items";

    /// Upstream double that records requests and replays a canned answer.
    pub struct FakeUpstream {
        pub calls: AtomicUsize,
        pub seen: Mutex<Vec<OutboundRequest>>,
        pub status: StatusCode,
        pub headers: HeaderMap,
        pub body: &'static str,
        pub fail: bool,
        /// Send `body`, then break the connection mid-stream.
        pub truncate_body: bool,
    }

    impl FakeUpstream {
        pub fn ok(body: &'static str) -> Self {
            Self::with_status(StatusCode::OK, body)
        }

        pub fn with_status(status: StatusCode, body: &'static str) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
                status,
                headers: HeaderMap::new(),
                body,
                fail: false,
                truncate_body: false,
            }
        }

        pub fn unreachable() -> Self {
            Self {
                fail: true,
                ..Self::ok("")
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Upstream for FakeUpstream {
        async fn send(&self, request: OutboundRequest) -> Result<UpstreamResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(request);
            if self.fail {
                return Err(GatewayError::UpstreamTransportFailure("connection refused".into()));
            }
            let body = if self.truncate_body {
                let chunks = vec![
                    Ok(Bytes::from_static(self.body.as_bytes())),
                    Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer")),
                ];
                Body::from_stream(futures_util::stream::iter(chunks))
            } else {
                Body::from(self.body)
            };
            Ok(UpstreamResponse {
                status: self.status,
                headers: self.headers.clone(),
                body,
            })
        }
    }

    #[derive(Default)]
    pub struct RecordingSink {
        pub events: Mutex<Vec<AccessLogEvent>>,
        pub fail: bool,
    }

    #[async_trait]
    impl LogSink for RecordingSink {
        async fn emit(&self, event: &AccessLogEvent) -> std::result::Result<(), SinkError> {
            if self.fail {
                return Err(SinkError::Unavailable("offline".into()));
            }
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    pub struct Harness {
        pub gateway: Gateway,
        pub upstream: Arc<FakeUpstream>,
        pub sink: Arc<RecordingSink>,
        pub counters: Arc<MemoryCounterStore>,
        pub cache: Arc<MemoryResponseCache>,
    }

    impl Harness {
        pub fn new(upstream: FakeUpstream) -> Self {
            Self::with(GatewayConfig::default(), upstream, RecordingSink::default())
        }

        pub fn with(config: GatewayConfig, upstream: FakeUpstream, sink: RecordingSink) -> Self {
            let upstream = Arc::new(upstream);
            let sink = Arc::new(sink);
            let counters = Arc::new(MemoryCounterStore::new());
            let cache = Arc::new(MemoryResponseCache::new());
            let gateway = Gateway::new(
                &config,
                Collaborators {
                    counters: counters.clone(),
                    cache: cache.clone(),
                    sink: sink.clone(),
                    upstream: upstream.clone(),
                },
                BackgroundTasks::new(),
            );
            Self {
                gateway,
                upstream,
                sink,
                counters,
                cache,
            }
        }

        pub async fn send(&self, request: Request<Body>) -> Response {
            let response = self.gateway.handle(RequestContext::from_request(request)).await;
            self.settle().await;
            response
        }

        pub async fn settle(&self) {
            assert!(self.gateway.background().drain(Duration::from_secs(5)).await);
        }

        pub fn events(&self) -> Vec<AccessLogEvent> {
            self.sink.events.lock().unwrap().clone()
        }

        pub async fn counter(&self) -> Option<String> {
            self.counters.get(&format!("rate-{ORIGIN}")).await.unwrap()
        }
    }

    pub fn request(method: Method, target: Option<&str>, origin: Option<&str>) -> Request<Body> {
        let uri = match target {
            Some(t) => format!("/?url={}", t),
            None => "/".to_string(),
        };
        let mut builder = Request::builder().method(method).uri(uri).header("host", "gateway.test");
        if let Some(origin) = origin {
            builder = builder.header("origin", origin);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn body_of(response: Response) -> Bytes {
        axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap()
    }

    #[tokio::test]
    async fn missing_target_is_400_without_side_effects() {
        let h = Harness::new(FakeUpstream::ok("x"));
        let response = h.send(request(Method::GET, None, Some(ORIGIN))).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
        assert_eq!(body_of(response).await, "Missing ?url=");
        assert_eq!(h.upstream.calls(), 0);
        assert!(h.events().is_empty());
        assert!(h.counters.is_empty());
    }

    #[tokio::test]
    async fn unknown_or_absent_origin_is_403_without_counting() {
        let h = Harness::new(FakeUpstream::ok("x"));
        for origin in [None, Some("https://evil.example.com")] {
            let response = h.send(request(Method::GET, Some(TARGET), origin)).await;
            assert_eq!(response.status(), StatusCode::FORBIDDEN);
            assert!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
            assert_eq!(body_of(response).await, "Origin not allowed");
        }
        assert!(h.counters.is_empty());
        assert_eq!(h.upstream.calls(), 0);
    }

    #[tokio::test]
    async fn unknown_target_is_403() {
        let h = Harness::new(FakeUpstream::ok("x"));
        let response = h
            .send(request(Method::GET, Some("https://evil.example.com/x"), Some(ORIGIN)))
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_of(response).await, "Target not allowed");
        assert_eq!(h.upstream.calls(), 0);
    }

    #[tokio::test]
    async fn allowed_request_is_forwarded_with_cors_and_miss() {
        let h = Harness::new(FakeUpstream::ok("items"));
        let response = h.send(request(Method::GET, Some(TARGET), Some(ORIGIN))).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), ORIGIN);
        assert_eq!(response.headers().get(X_CACHE_STATUS).unwrap(), "MISS");
        assert_eq!(response.headers().get("cache-control").unwrap(), "max-age=60");
        assert_eq!(body_of(response).await, "items");

        assert_eq!(h.upstream.calls(), 1);
        assert_eq!(h.counter().await.as_deref(), Some("1"));
        assert_eq!(
            h.events(),
            vec![AccessLogEvent {
                origin: ORIGIN.into(),
                target: TARGET.into(),
                method: "GET".into(),
                status: 200,
                cache: CacheOutcome::Miss,
            }]
        );
    }

    #[tokio::test]
    async fn second_get_is_served_from_cache() {
        let h = Harness::new(FakeUpstream::ok("cached body"));
        let first = h.send(request(Method::GET, Some(TARGET), Some(ORIGIN))).await;
        let first_body = body_of(first).await;

        let second = h.send(request(Method::GET, Some(TARGET), Some(ORIGIN))).await;
        assert_eq!(second.status(), StatusCode::OK);
        assert_eq!(second.headers().get(X_CACHE_STATUS).unwrap(), "HIT");
        assert_eq!(second.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), ORIGIN);
        assert_eq!(body_of(second).await, first_body);

        assert_eq!(h.upstream.calls(), 1);
        let events = h.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].cache, CacheOutcome::Hit);
        assert_eq!(events[1].status, 200);
        // cache hits still consume a rate-limit slot
        assert_eq!(h.counter().await.as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn post_is_never_cached() {
        let h = Harness::new(FakeUpstream::ok("created"));
        for _ in 0..2 {
            let response = h.send(request(Method::POST, Some(TARGET), Some(ORIGIN))).await;
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(response.headers().get(X_CACHE_STATUS).unwrap(), "MISS");
            assert!(response.headers().get("cache-control").is_none());
        }
        assert_eq!(h.upstream.calls(), 2);
        assert!(h.cache.is_empty());
    }

    #[tokio::test]
    async fn unsuccessful_get_is_not_cached() {
        let h = Harness::new(FakeUpstream::with_status(StatusCode::NOT_FOUND, "gone"));
        for _ in 0..2 {
            let response = h.send(request(Method::GET, Some(TARGET), Some(ORIGIN))).await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
            assert_eq!(response.headers().get(X_CACHE_STATUS).unwrap(), "MISS");
        }
        assert_eq!(h.upstream.calls(), 2);
        assert_eq!(h.events()[0].status, 404);
    }

    #[tokio::test]
    async fn redirects_are_relayed_not_followed() {
        let mut upstream = FakeUpstream::with_status(StatusCode::FOUND, "");
        upstream
            .headers
            .insert("location", "https://elsewhere.example.com/".parse().unwrap());
        let h = Harness::new(upstream);

        let response = h.send(request(Method::GET, Some(TARGET), Some(ORIGIN))).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers().get("location").unwrap(),
            "https://elsewhere.example.com/"
        );
        assert_eq!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), ORIGIN);
        assert!(h.cache.is_empty());
    }

    #[tokio::test]
    async fn preflight_skips_limiter_cache_and_upstream() {
        let h = Harness::new(FakeUpstream::ok("x"));
        h.counters
            .put(&format!("rate-{ORIGIN}"), "100000".into(), Duration::from_secs(60))
            .await
            .unwrap();

        let response = h.send(request(Method::OPTIONS, Some(TARGET), Some(ORIGIN))).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), ORIGIN);
        assert!(response.headers().get("access-control-allow-methods").is_some());
        assert!(body_of(response).await.is_empty());

        assert_eq!(h.counter().await.as_deref(), Some("100000"));
        assert_eq!(h.upstream.calls(), 0);
        assert!(h.events().is_empty());
    }

    #[tokio::test]
    async fn preflight_still_requires_validation() {
        let h = Harness::new(FakeUpstream::ok("x"));
        let response = h
            .send(request(Method::OPTIONS, Some(TARGET), Some("https://evil.example.com")))
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn over_limit_origin_gets_429_without_increment() {
        let h = Harness::new(FakeUpstream::ok("x"));
        h.counters
            .put(&format!("rate-{ORIGIN}"), "301".into(), Duration::from_secs(60))
            .await
            .unwrap();

        let response = h.send(request(Method::GET, Some(TARGET), Some(ORIGIN))).await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
        assert_eq!(body_of(response).await, "Rate limit exceeded");
        assert_eq!(h.counter().await.as_deref(), Some("301"));
        assert_eq!(h.upstream.calls(), 0);
    }

    #[tokio::test]
    async fn count_at_threshold_still_proceeds() {
        let h = Harness::new(FakeUpstream::ok("x"));
        h.counters
            .put(&format!("rate-{ORIGIN}"), "300".into(), Duration::from_secs(60))
            .await
            .unwrap();

        let response = h.send(request(Method::GET, Some(TARGET), Some(ORIGIN))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(h.counter().await.as_deref(), Some("301"));
    }

    #[tokio::test]
    async fn transport_failure_is_502_without_log() {
        let h = Harness::new(FakeUpstream::unreachable());
        let response = h.send(request(Method::GET, Some(TARGET), Some(ORIGIN))).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(h.events().is_empty());
        assert!(h.cache.is_empty());
    }

    #[tokio::test]
    async fn body_broken_while_buffering_is_502_without_log() {
        let upstream = FakeUpstream {
            truncate_body: true,
            ..FakeUpstream::ok("partial")
        };
        let h = Harness::new(upstream);

        let response = h.send(request(Method::GET, Some(TARGET), Some(ORIGIN))).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
        assert!(h.events().is_empty());
        assert!(h.cache.is_empty());
    }

    #[tokio::test]
    async fn sink_failure_does_not_change_response() {
        let sink = RecordingSink {
            fail: true,
            ..RecordingSink::default()
        };
        let h = Harness::with(GatewayConfig::default(), FakeUpstream::ok("fine"), sink);
        let response = h.send(request(Method::GET, Some(TARGET), Some(ORIGIN))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_of(response).await, "fine");
    }

    #[tokio::test]
    async fn outbound_headers_are_sanitized() {
        let h = Harness::new(FakeUpstream::ok("x"));
        let request = Request::builder()
            .method(Method::GET)
            .uri(format!("/?url={TARGET}"))
            .header("host", "gateway.test")
            .header("origin", ORIGIN)
            .header("referer", "https://proxy-worker.bitsonline.nl/page")
            .header("cf-connecting-ip", "203.0.113.1")
            .header("x-real-ip", "203.0.113.1")
            .header("x-forwarded-for", "203.0.113.1")
            .header("accept", "application/json")
            .body(Body::empty())
            .unwrap();
        h.send(request).await;

        let seen = h.upstream.seen.lock().unwrap();
        let headers = &seen[0].headers;
        for name in ["origin", "referer", "cf-connecting-ip", "x-real-ip", "x-forwarded-for", "host"] {
            assert!(headers.get(name).is_none(), "{name} leaked upstream");
        }
        assert_eq!(headers.get("accept").unwrap(), "application/json");
        assert_eq!(seen[0].url.as_str(), TARGET);
    }

    #[tokio::test]
    async fn cache_disabled_always_forwards() {
        let mut config = GatewayConfig::default();
        config.cache.enabled = false;
        let h = Harness::with(config, FakeUpstream::ok("x"), RecordingSink::default());
        for _ in 0..2 {
            let response = h.send(request(Method::GET, Some(TARGET), Some(ORIGIN))).await;
            assert_eq!(response.headers().get(X_CACHE_STATUS).unwrap(), "MISS");
        }
        assert_eq!(h.upstream.calls(), 2);
    }
}
