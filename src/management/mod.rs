//! Management listener: metrics, liveness, on-demand probe and status.
//!
//! | Route      | Purpose                                          |
//! |------------|--------------------------------------------------|
//! | `/metrics` | Prometheus text exposition                       |
//! | `/livez`   | Process is up (any method)                       |
//! | `/healthz` | Runs one probe synchronously: 200 or 503 (any)   |
//! | `/status`  | JSON view of the last health cycle               |

pub mod handlers;

use std::sync::Arc;

use axum::{
    routing::{any, get},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::health::{CorrelationTable, HealthReport, ProbeEmitter};
use self::handlers::*;

#[derive(Clone)]
pub struct ManagementState {
    /// `None` when no probe channel URL is configured.
    pub emitter: Option<ProbeEmitter>,
    pub report: Arc<HealthReport>,
    pub table: Arc<CorrelationTable>,
    /// `None` when metrics are disabled.
    pub metrics: Option<PrometheusHandle>,
}

pub fn setup_management_router(state: ManagementState) -> Router {
    Router::new()
        .route("/metrics", get(metrics))
        .route("/livez", any(livez))
        .route("/healthz", any(healthz))
        .route("/status", get(status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the management router until `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    state: ManagementState,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "Management server (metrics, healthz) listening");

    axum::serve(listener, setup_management_router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;

    tracing::info!("Management server stopped");
    Ok(())
}
