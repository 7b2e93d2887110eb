//! Probe interception on the inbound relay path.
//!
//! # Responsibilities
//! - Recognize probe echoes before any forwarding decision
//! - Resolve the matching slot and acknowledge the relay
//! - Hand everything else to the forwarder, counted as ordinary traffic
//!
//! # Design Decisions
//! - The `X-Health-Check-ID` header is the primary marker; no body read needed
//! - Body detection (JSON `{"type":"health-check","id":..}`) is an opt-in
//!   fallback for relays that drop custom headers
//! - Anything that fails to parse as a probe is ordinary traffic, never an error
//! - Probe acknowledgements close the connection so the relay does not pool it

use std::sync::atomic::{AtomicU64, Ordering};

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
};

use crate::health::probe::{ProbePayload, HEALTH_CHECK_ID_HEADER};
use crate::http::server::RelayState;
use crate::observability::metrics;

/// Relay path counters.
#[derive(Debug, Default)]
pub struct RelayStats {
    forwarded: AtomicU64,
    probes_matched: AtomicU64,
    probes_unmatched: AtomicU64,
}

impl RelayStats {
    /// Ordinary events handed to the forwarder.
    pub fn forwarded(&self) -> u64 {
        self.forwarded.load(Ordering::Relaxed)
    }

    /// Probes that woke a waiting emitter.
    pub fn probes_matched(&self) -> u64 {
        self.probes_matched.load(Ordering::Relaxed)
    }

    /// Probes with no outstanding slot (late, duplicate or forged).
    pub fn probes_unmatched(&self) -> u64 {
        self.probes_unmatched.load(Ordering::Relaxed)
    }
}

/// Probe id carried in the marker header, if any.
pub fn probe_id_from_headers(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(HEALTH_CHECK_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty())
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|ct| ct.split(';').next())
        .map(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
        .unwrap_or(false)
}

/// Probe id carried in a JSON body, if the body is a well-formed probe.
pub fn probe_id_from_body(headers: &HeaderMap, body: &[u8]) -> Option<String> {
    if !is_json(headers) {
        return None;
    }
    serde_json::from_slice::<ProbePayload>(body)
        .ok()
        .filter(ProbePayload::is_probe)
        .map(|payload| payload.id)
}

/// Resolve a probe echo and build the acknowledgement.
fn acknowledge_probe(state: &RelayState, id: &str) -> Response {
    let matched = state.table.resolve(id);
    metrics::record_probe_intercepted(matched);

    if matched {
        state.stats.probes_matched.fetch_add(1, Ordering::Relaxed);
        tracing::info!(probe_id = %id, "Intercepted health check event");
    } else {
        state.stats.probes_unmatched.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(probe_id = %id, "Health check event with no waiting probe, dropping");
    }

    let mut response = StatusCode::OK.into_response();
    response
        .headers_mut()
        .insert(header::CONNECTION, HeaderValue::from_static("close"));
    response
}

async fn forward_ordinary(state: &RelayState, request: Request<Body>) -> Response {
    state.stats.forwarded.fetch_add(1, Ordering::Relaxed);
    metrics::record_event_relayed();

    let method = request.method().clone();
    let path = request.uri().path().to_string();

    match state.forwarder.forward(request).await {
        Ok(response) => {
            tracing::debug!(method = %method, path = %path, status = %response.status(), "Relayed event downstream");
            response
        }
        Err(e) => {
            tracing::error!(method = %method, path = %path, error = %e, "Downstream error");
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}

/// Entry point for every inbound relayed request.
pub async fn relay_handler(State(state): State<RelayState>, request: Request<Body>) -> Response {
    if let Some(id) = probe_id_from_headers(request.headers()) {
        let id = id.to_string();
        return acknowledge_probe(&state, &id);
    }

    if !(state.detect_probe_in_body && is_json(request.headers())) {
        return forward_ordinary(&state, request).await;
    }

    let (parts, body) = request.into_parts();
    let bytes = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read relayed request body");
            return (StatusCode::INTERNAL_SERVER_ERROR, "cannot read request body").into_response();
        }
    };

    if let Some(id) = probe_id_from_body(&parts.headers, &bytes) {
        return acknowledge_probe(&state, &id);
    }
    forward_ordinary(&state, Request::from_parts(parts, Body::from(bytes))).await
}
