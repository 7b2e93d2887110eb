//! Synthetic round-trip probe emission.
//!
//! # Responsibilities
//! - Build a uniquely identified probe payload
//! - Register its slot in the correlation table
//! - Post it to the upstream relay channel under a deadline
//! - Wait for the interceptor to signal the round-trip, under a deadline
//!
//! # Design Decisions
//! - No retries within a probe; the health cycle interval is the retry cadence
//! - The slot is removed on every exit path, including cancellation, by a
//!   drop guard
//! - The relay's response status is logged but not judged; only a transport
//!   failure counts as a send failure

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time;
use uuid::Uuid;

use crate::config::ProbeConfig;
use crate::health::correlation::CorrelationTable;
use crate::health::status::HealthStatus;

/// Header carrying the probe id on the outbound send and the relayed echo.
pub const HEALTH_CHECK_ID_HEADER: &str = "x-health-check-id";

/// Value of the payload `type` field marking a probe.
pub const PROBE_KIND: &str = "health-check";

pub const SUCCESS_MESSAGE: &str = "Health check completed successfully";
pub const TIMEOUT_MESSAGE: &str = "Health check timed out waiting for event round-trip";
pub const SEND_FAILURE_PREFIX: &str = "Failed to POST to smee server";

/// JSON body of a probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbePayload {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
}

impl ProbePayload {
    /// A probe with a fresh random id.
    pub fn new() -> Self {
        Self {
            kind: PROBE_KIND.to_string(),
            id: Uuid::new_v4().to_string(),
        }
    }

    pub fn is_probe(&self) -> bool {
        self.kind == PROBE_KIND && !self.id.is_empty()
    }
}

impl Default for ProbePayload {
    fn default() -> Self {
        Self::new()
    }
}

/// Error type for emitter construction.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to build probe HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Removes a registration from the table when dropped.
struct Registration<'a> {
    table: &'a CorrelationTable,
    id: &'a str,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.table.remove(self.id);
    }
}

/// Sends probes and waits for their round-trip.
#[derive(Debug, Clone)]
pub struct ProbeEmitter {
    table: Arc<CorrelationTable>,
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl ProbeEmitter {
    /// Create an emitter from probe configuration.
    pub fn new(table: Arc<CorrelationTable>, config: &ProbeConfig) -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.insecure_skip_verify)
            .build()?;

        if config.insecure_skip_verify {
            tracing::warn!("TLS certificate verification disabled for probe sends");
        }

        Ok(Self {
            table,
            client,
            endpoint: config.channel_url.clone(),
            timeout: config.timeout(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run one probe against the configured endpoint and deadline.
    pub async fn run_probe(&self) -> HealthStatus {
        self.run_probe_with(&self.endpoint, self.timeout).await
    }

    /// Run one probe against `endpoint`, waiting at most `timeout` for the
    /// round-trip.
    pub async fn run_probe_with(&self, endpoint: &str, timeout: Duration) -> HealthStatus {
        let payload = ProbePayload::new();

        let slot = match self.table.register(&payload.id) {
            Ok(slot) => slot,
            Err(e) => {
                tracing::error!(error = %e, "Probe id collision");
                return HealthStatus::failure(format!("Probe id collision: {}", e));
            }
        };
        let _registration = Registration {
            table: &self.table,
            id: &payload.id,
        };

        tracing::debug!(probe_id = %payload.id, endpoint = %endpoint, "Sending health check probe");

        let sent = self
            .client
            .post(endpoint)
            .timeout(timeout)
            .header(HEALTH_CHECK_ID_HEADER, &payload.id)
            .json(&payload)
            .send()
            .await;

        match sent {
            Ok(response) => {
                if !response.status().is_success() {
                    tracing::warn!(
                        probe_id = %payload.id,
                        status = %response.status(),
                        "Relay answered probe with non-success status"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(probe_id = %payload.id, error = %e, "Health check failed: could not post probe");
                return HealthStatus::failure(format!("{}: {}", SEND_FAILURE_PREFIX, e));
            }
        }

        match time::timeout(timeout, slot).await {
            Ok(Ok(())) => {
                tracing::info!(probe_id = %payload.id, "Health check passed");
                HealthStatus::success(SUCCESS_MESSAGE)
            }
            // The sender can only vanish through remove(), which nobody but
            // this probe calls while it is outstanding; treat it as a miss.
            Ok(Err(_)) | Err(_) => {
                tracing::warn!(
                    probe_id = %payload.id,
                    timeout_secs = timeout.as_secs_f64(),
                    "Health check failed: timed out waiting for event round-trip"
                );
                HealthStatus::failure(TIMEOUT_MESSAGE)
            }
        }
    }
}
