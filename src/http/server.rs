//! Relay HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum router for inbound relayed traffic
//! - Wire up middleware (tracing, request ID, timeout, body limit)
//! - Bind server to listener, stop on the shutdown signal

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{routing::any, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{DownstreamConfig, RelayConfig};
use crate::health::CorrelationTable;
use crate::http::forward::{ForwardError, Forwarder};
use crate::http::interceptor::{relay_handler, RelayStats};

/// Application state injected into the relay handler.
#[derive(Clone)]
pub struct RelayState {
    pub table: Arc<CorrelationTable>,
    pub forwarder: Arc<Forwarder>,
    pub stats: Arc<RelayStats>,
    pub detect_probe_in_body: bool,
    pub max_body_bytes: usize,
}

/// Inbound relay server.
pub struct RelayServer {
    router: Router,
    stats: Arc<RelayStats>,
}

impl RelayServer {
    /// Create a relay server sharing `table` with the probe emitter.
    pub fn new(
        relay: &RelayConfig,
        downstream: &DownstreamConfig,
        table: Arc<CorrelationTable>,
    ) -> Result<Self, ForwardError> {
        let forwarder = Arc::new(Forwarder::new(downstream)?);
        let stats = Arc::new(RelayStats::default());

        let state = RelayState {
            table,
            forwarder,
            stats: stats.clone(),
            detect_probe_in_body: relay.detect_probe_in_body,
            max_body_bytes: relay.max_body_bytes,
        };

        Ok(Self {
            router: Self::build_router(relay, state),
            stats,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &RelayConfig, state: RelayState) -> Router {
        Router::new()
            .route("/", any(relay_handler))
            .route("/{*path}", any(relay_handler))
            .with_state(state)
            .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
            .layer(TimeoutLayer::new(config.request_timeout()))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    pub fn stats(&self) -> Arc<RelayStats> {
        self.stats.clone()
    }

    /// The router, for serving or driving in-process.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Relay server listening");

        let service = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, service)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("Relay server stopped");
        Ok(())
    }
}
