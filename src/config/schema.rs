//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the sidecar.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the relay sidecar.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SidecarConfig {
    /// Inbound relay listener (traffic arriving from the webhook relay client).
    pub relay: RelayConfig,

    /// Downstream consumer service that ordinary events are forwarded to.
    pub downstream: DownstreamConfig,

    /// Synthetic round-trip probe settings.
    pub probe: ProbeConfig,

    /// Status file consumed by external liveness scripts.
    pub status: StatusConfig,

    /// Management listener (metrics, liveness, on-demand probe).
    pub management: ManagementConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Inbound relay listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Total time allowed for one relayed request, in seconds.
    ///
    /// Webhook senders give up long before slow consumers answer, so this
    /// bounds how long an abandoned connection can hold a handler.
    pub request_timeout_secs: u64,

    /// Maximum accepted request body in bytes.
    pub max_body_bytes: usize,

    /// Also recognize probes by their JSON body when the header is missing.
    pub detect_probe_in_body: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 180,
            max_body_bytes: 10 * 1024 * 1024, // 10MB
            detect_probe_in_body: false,
        }
    }
}

impl RelayConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Downstream service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DownstreamConfig {
    /// Base URL of the downstream service (e.g., "http://127.0.0.1:3000/hook").
    pub url: String,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for DownstreamConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            connect_timeout_secs: 5,
        }
    }
}

/// Probe configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Run the periodic health cycle.
    pub enabled: bool,

    /// Relay channel URL the probe is posted to.
    pub channel_url: String,

    /// Health cycle interval in seconds.
    pub interval_secs: u64,

    /// Round-trip deadline in seconds (also bounds the outbound send).
    pub timeout_secs: u64,

    /// Skip TLS certificate validation on the outbound send.
    pub insecure_skip_verify: bool,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            channel_url: String::new(),
            interval_secs: 30,
            timeout_secs: 20,
            insecure_skip_verify: false,
        }
    }
}

impl ProbeConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Whether a channel URL has been supplied at all.
    pub fn is_configured(&self) -> bool {
        !self.channel_url.trim().is_empty()
    }
}

/// Status file configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StatusConfig {
    /// Path of the two-line `key=value` status file.
    pub file_path: String,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            file_path: "/shared/health-status.txt".to_string(),
        }
    }
}

/// Management listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ManagementConfig {
    /// Bind address for `/metrics`, `/livez`, `/healthz` and `/status`.
    pub bind_address: String,
}

impl Default for ManagementConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:9100".to_string(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error), used when `RUST_LOG` is unset.
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Install the Prometheus recorder and serve `/metrics`.
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            metrics_enabled: true,
        }
    }
}
