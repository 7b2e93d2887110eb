use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::health::{DriverState, HealthStatus};
use crate::management::ManagementState;

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

#[derive(Debug, Serialize)]
pub struct StatusView {
    pub version: &'static str,
    pub driver: &'static str,
    pub cycles: u64,
    pub outstanding_probes: usize,
    pub last: Option<HealthStatus>,
}

fn driver_label(state: DriverState) -> &'static str {
    match state {
        DriverState::Idle => "idle",
        DriverState::RunningProbe => "running_probe",
        DriverState::Recording => "recording",
        DriverState::Stopped => "stopped",
    }
}

/// Process liveness; answers any method.
pub async fn livez() -> &'static str {
    "alive\n"
}

/// Synchronous end-to-end probe.
pub async fn healthz(State(state): State<ManagementState>) -> Response {
    let Some(emitter) = state.emitter.as_ref() else {
        tracing::error!("Healthz requested but no probe channel URL is configured");
        return (StatusCode::INTERNAL_SERVER_ERROR, "Sidecar not configured\n").into_response();
    };

    let status = emitter.run_probe().await;
    if status.is_success() {
        (StatusCode::OK, "OK\n").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, format!("{}\n", status.message)).into_response()
    }
}

/// Prometheus scrape endpoint.
pub async fn metrics(State(state): State<ManagementState>) -> Response {
    match state.metrics.as_ref() {
        Some(handle) => (
            [(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics disabled\n").into_response(),
    }
}

/// Latest health cycle as JSON.
pub async fn status(State(state): State<ManagementState>) -> Json<StatusView> {
    Json(StatusView {
        version: env!("CARGO_PKG_VERSION"),
        driver: driver_label(state.report.state()),
        cycles: state.report.cycles(),
        outstanding_probes: state.table.len(),
        last: state.report.latest().map(|status| (*status).clone()),
    })
}
