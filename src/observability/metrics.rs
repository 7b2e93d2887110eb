//! Metrics collection and exposition.
//!
//! # Metrics
//! - `health_check` (gauge): outcome of the last completed health cycle,
//!   1=success, 0=failure
//! - `smee_events_relayed_total` (counter): ordinary events forwarded
//!   downstream (probes excluded)
//! - `health_check_probes_intercepted_total` (counter): probe echoes seen on
//!   the relay path, labelled `matched="true|false"`
//!
//! # Design Decisions
//! - One process-wide Prometheus recorder, installed once and rendered by
//!   the management listener
//! - Recording before the recorder is installed is a no-op

use std::sync::{Mutex, OnceLock};

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::health::HealthOutcome;

pub const HEALTH_CHECK: &str = "health_check";
pub const EVENTS_RELAYED: &str = "smee_events_relayed_total";
pub const PROBES_INTERCEPTED: &str = "health_check_probes_intercepted_total";

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
static INSTALL: Mutex<()> = Mutex::new(());

/// Install the Prometheus recorder, or return the one already installed.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    if let Some(handle) = HANDLE.get() {
        return Ok(handle.clone());
    }

    let _install = INSTALL.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(handle) = HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    describe();
    Ok(HANDLE.get_or_init(|| handle).clone())
}

fn describe() {
    metrics::describe_gauge!(
        HEALTH_CHECK,
        "Indicates the outcome of the last completed health check (1 for OK, 0 for failure)."
    );
    metrics::describe_counter!(
        EVENTS_RELAYED,
        "Total number of regular events relayed by the sidecar."
    );
    metrics::describe_counter!(
        PROBES_INTERCEPTED,
        "Health check probes intercepted on the relay path."
    );
}

/// Record the outcome of a health cycle.
pub fn record_health_check(outcome: HealthOutcome) {
    metrics::gauge!(HEALTH_CHECK).set(outcome.gauge_value());
}

/// Record an ordinary event forwarded downstream.
pub fn record_event_relayed() {
    metrics::counter!(EVENTS_RELAYED).increment(1);
}

/// Record an intercepted probe and whether a waiter was found.
pub fn record_probe_intercepted(matched: bool) {
    let matched = if matched { "true" } else { "false" };
    metrics::counter!(PROBES_INTERCEPTED, "matched" => matched).increment(1);
}
