//! Startup orchestration.
//!
//! # Responsibilities
//! - Build every subsystem from a validated configuration
//! - Share one correlation table between the emitter and the interceptor
//! - Spawn the relay server, the management server and the health cycle
//!   driver on caller-bound listeners
//!
//! # Design Decisions
//! - Fail fast: any construction error is fatal
//! - Listeners are bound by the caller so tests can use port 0
//! - The driver only runs when probing is enabled and a channel URL is set

use std::sync::Arc;

use metrics_exporter_prometheus::{BuildError, PrometheusHandle};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::config::SidecarConfig;
use crate::health::{
    CorrelationTable, HealthCycleDriver, HealthReport, ProbeEmitter, ProbeError,
};
use crate::http::{ForwardError, RelayServer, RelayStats};
use crate::lifecycle::Shutdown;
use crate::management::{self, ManagementState};
use crate::observability::metrics;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("relay setup failed: {0}")]
    Forward(#[from] ForwardError),

    #[error("probe setup failed: {0}")]
    Probe(#[from] ProbeError),

    #[error("metrics recorder setup failed: {0}")]
    Metrics(#[from] BuildError),
}

/// A fully constructed, not yet running sidecar.
pub struct Sidecar {
    config: SidecarConfig,
    table: Arc<CorrelationTable>,
    report: Arc<HealthReport>,
    relay: RelayServer,
    emitter: Option<ProbeEmitter>,
    metrics: Option<PrometheusHandle>,
}

impl Sidecar {
    pub fn build(config: SidecarConfig) -> Result<Self, StartupError> {
        let table = Arc::new(CorrelationTable::new());
        let report = Arc::new(HealthReport::new());

        let relay = RelayServer::new(&config.relay, &config.downstream, table.clone())?;

        let emitter = if config.probe.is_configured() {
            Some(ProbeEmitter::new(table.clone(), &config.probe)?)
        } else {
            tracing::warn!("No probe channel URL configured, health checks disabled");
            None
        };

        let metrics = if config.observability.metrics_enabled {
            Some(metrics::init_metrics()?)
        } else {
            None
        };

        Ok(Self {
            config,
            table,
            report,
            relay,
            emitter,
            metrics,
        })
    }

    pub fn table(&self) -> Arc<CorrelationTable> {
        self.table.clone()
    }

    pub fn report(&self) -> Arc<HealthReport> {
        self.report.clone()
    }

    pub fn relay_stats(&self) -> Arc<RelayStats> {
        self.relay.stats()
    }

    /// Start all tasks. Each one stops when `shutdown` fires.
    pub fn spawn(
        self,
        relay_listener: TcpListener,
        management_listener: TcpListener,
        shutdown: &Shutdown,
    ) -> SidecarHandle {
        let mut tasks = Vec::with_capacity(3);

        let relay_rx = shutdown.subscribe();
        let relay = self.relay;
        tasks.push(tokio::spawn(async move {
            if let Err(e) = relay.run(relay_listener, relay_rx).await {
                tracing::error!(error = %e, "Relay server failed");
            }
        }));

        let state = ManagementState {
            emitter: self.emitter.clone(),
            report: self.report.clone(),
            table: self.table.clone(),
            metrics: self.metrics,
        };
        let management_rx = shutdown.subscribe();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = management::serve(management_listener, state, management_rx).await {
                tracing::error!(error = %e, "Management server failed");
            }
        }));

        match self.emitter {
            Some(emitter) if self.config.probe.enabled => {
                let driver = HealthCycleDriver::new(
                    emitter,
                    self.config.status.file_path.clone(),
                    self.config.probe.interval(),
                    self.report.clone(),
                );
                tasks.push(tokio::spawn(driver.run(shutdown.subscribe())));
            }
            _ => tracing::info!("Periodic health cycle disabled"),
        }

        SidecarHandle { tasks }
    }
}

/// Running sidecar tasks.
pub struct SidecarHandle {
    tasks: Vec<JoinHandle<()>>,
}

impl SidecarHandle {
    /// Wait for every task to finish.
    pub async fn wait(self) {
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Sidecar task panicked");
            }
        }
    }
}
