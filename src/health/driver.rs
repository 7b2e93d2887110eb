//! Periodic health cycle.
//!
//! # States
//! ```text
//! Idle → RunningProbe → Recording → Idle → ...
//! ```
//!
//! The first probe runs as soon as the driver starts; later cycles follow a
//! fixed period measured from that first start. A shutdown signal ends the
//! loop, abandoning an in-flight probe.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use tokio::sync::broadcast;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::health::probe::ProbeEmitter;
use crate::health::status::{HealthStatus, StatusFile};
use crate::observability::metrics;

/// Driver state.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle = 0,
    RunningProbe = 1,
    Recording = 2,
    Stopped = 3,
}

impl From<u8> for DriverState {
    fn from(val: u8) -> Self {
        match val {
            1 => DriverState::RunningProbe,
            2 => DriverState::Recording,
            3 => DriverState::Stopped,
            _ => DriverState::Idle,
        }
    }
}

/// Latest cycle outcome, shared with the management endpoints.
#[derive(Debug)]
pub struct HealthReport {
    latest: ArcSwapOption<HealthStatus>,
    state: AtomicU8,
    cycles: AtomicU64,
}

impl HealthReport {
    pub fn new() -> Self {
        Self {
            latest: ArcSwapOption::empty(),
            state: AtomicU8::new(DriverState::Idle as u8),
            cycles: AtomicU64::new(0),
        }
    }

    /// Status of the most recently completed cycle, if any.
    pub fn latest(&self) -> Option<Arc<HealthStatus>> {
        self.latest.load_full()
    }

    pub fn state(&self) -> DriverState {
        DriverState::from(self.state.load(Ordering::Acquire))
    }

    /// Number of completed cycles.
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Acquire)
    }

    fn set_state(&self, state: DriverState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn publish(&self, status: HealthStatus) {
        self.latest.store(Some(Arc::new(status)));
        self.cycles.fetch_add(1, Ordering::AcqRel);
    }
}

impl Default for HealthReport {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs the probe on a fixed period and records each outcome.
pub struct HealthCycleDriver {
    emitter: ProbeEmitter,
    status_file: StatusFile,
    interval: Duration,
    report: Arc<HealthReport>,
}

impl HealthCycleDriver {
    pub fn new(
        emitter: ProbeEmitter,
        status_path: impl Into<PathBuf>,
        interval: Duration,
        report: Arc<HealthReport>,
    ) -> Self {
        Self {
            emitter,
            status_file: StatusFile::new(status_path),
            interval,
            report,
        }
    }

    /// Loop until `shutdown` fires (or its sender is dropped).
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval_secs = self.interval.as_secs_f64(),
            timeout_secs = self.emitter.timeout().as_secs_f64(),
            endpoint = %self.emitter.endpoint(),
            status_file = %self.status_file.path().display(),
            "Health cycle driver starting"
        );

        // First cycle fires now; the ticker only governs the ones after it.
        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let cycle = tokio::select! {
                status = self.run_cycle() => Some(status),
                _ = shutdown.recv() => None,
            };
            if cycle.is_none() {
                tracing::info!("Health cycle driver received shutdown signal, abandoning in-flight probe");
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.recv() => {
                    tracing::info!("Health cycle driver received shutdown signal, exiting loop");
                    break;
                }
            }
        }

        self.report.set_state(DriverState::Stopped);
    }

    /// Run one probe and record its outcome.
    pub async fn run_cycle(&self) -> HealthStatus {
        self.report.set_state(DriverState::RunningProbe);
        let status = self.emitter.run_probe().await;

        self.report.set_state(DriverState::Recording);
        self.record(&status).await;

        self.report.set_state(DriverState::Idle);
        status
    }

    async fn record(&self, status: &HealthStatus) {
        if let Err(e) = self.status_file.write(status).await {
            tracing::error!(error = %e, "Failed to persist health status");
        }
        metrics::record_health_check(status.outcome);
        self.report.publish(status.clone());

        tracing::debug!(
            outcome = %status.outcome,
            message = %status.message,
            "Health cycle recorded"
        );
    }
}
