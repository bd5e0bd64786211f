//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize observability from the loaded configuration
//! - Build stores, the upstream client and the gateway in dependency order
//! - Start background tasks (sweeper, signal handler)
//! - Bind the listener, serve, then drain on shutdown
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listener starts last (traffic only when ready)

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::cache::MemoryResponseCache;
use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::gateway::{Collaborators, Gateway};
use crate::http::GatewayServer;
use crate::lifecycle::{signals, BackgroundTasks, Shutdown, Sweeper};
use crate::observability::{logging, metrics, TracingLogSink};
use crate::store::MemoryCounterStore;
use crate::upstream::HttpUpstream;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid metrics address {0:?}")]
    MetricsAddress(String),

    #[error("failed to build upstream client: {0}")]
    Upstream(#[from] GatewayError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Run the gateway until a termination signal arrives.
pub async fn run(config: GatewayConfig) -> Result<(), StartupError> {
    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "cors-gateway starting");

    if config.observability.metrics_enabled {
        let addr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|_| StartupError::MetricsAddress(config.observability.metrics_address.clone()))?;
        metrics::init_metrics(addr);
    }

    let listener = TcpListener::bind(&config.listener.bind_address)
        .await
        .map_err(|source| StartupError::Bind {
            address: config.listener.bind_address.clone(),
            source,
        })?;

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());
    serve(config, listener, shutdown).await
}

/// Serve on an already bound listener until `shutdown` fires.
pub async fn serve(config: GatewayConfig, listener: TcpListener, shutdown: Shutdown) -> Result<(), StartupError> {
    let counters = Arc::new(MemoryCounterStore::new());
    let cache = Arc::new(MemoryResponseCache::with_max_entries(config.cache.max_entries));
    let background = BackgroundTasks::new();

    let gateway = Gateway::new(
        &config,
        Collaborators {
            counters: counters.clone(),
            cache: cache.clone(),
            sink: Arc::new(TracingLogSink),
            upstream: Arc::new(HttpUpstream::new(&config.upstream)?),
        },
        background.clone(),
    );

    let sweeper = Sweeper::new(
        counters,
        cache,
        Duration::from_secs(config.cache.sweep_interval_secs),
    );
    let sweeper_task = tokio::spawn(sweeper.run(shutdown.subscribe()));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        allowed_origins = config.policy.allowed_origins.len(),
        allowed_targets = config.policy.allowed_targets.len(),
        rate_limit = config.rate_limit.max_requests,
        cache_enabled = config.cache.enabled,
        "Configuration loaded"
    );

    let server = GatewayServer::new(&config, Arc::new(gateway));
    let result = server.run(listener, shutdown.subscribe()).await;

    // The server may also stop on its own error; make sure the sweeper ends.
    shutdown.trigger();
    let drain_timeout = Duration::from_secs(config.lifecycle.drain_timeout_secs);
    if background.drain(drain_timeout).await {
        tracing::info!("Background work drained");
    }
    let _ = sweeper_task.await;

    result?;
    tracing::info!("Shutdown complete");
    Ok(())
}
