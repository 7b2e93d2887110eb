//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate URLs, bind addresses and value ranges
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: SidecarConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::SidecarConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid bind address '{value}'")]
    BindAddress { field: &'static str, value: String },

    #[error("{field} must be set")]
    Missing { field: &'static str },

    #[error("{field}: invalid URL '{value}': {reason}")]
    Url {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &SidecarConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_bind(&mut errors, "relay.bind_address", &config.relay.bind_address);
    check_bind(
        &mut errors,
        "management.bind_address",
        &config.management.bind_address,
    );

    if config.relay.request_timeout_secs == 0 {
        errors.push(ValidationError::Zero {
            field: "relay.request_timeout_secs",
        });
    }
    if config.relay.max_body_bytes == 0 {
        errors.push(ValidationError::Zero {
            field: "relay.max_body_bytes",
        });
    }

    // The forwarding client speaks plain HTTP to a co-located service.
    if config.downstream.url.trim().is_empty() {
        errors.push(ValidationError::Missing {
            field: "downstream.url",
        });
    } else {
        check_url(&mut errors, "downstream.url", &config.downstream.url, &["http"]);
    }

    // A configured channel backs on-demand checks even with the cycle off.
    if config.probe.is_configured() {
        check_url(
            &mut errors,
            "probe.channel_url",
            &config.probe.channel_url,
            &["http", "https"],
        );
        if config.probe.timeout_secs == 0 {
            errors.push(ValidationError::Zero {
                field: "probe.timeout_secs",
            });
        }
    }

    if config.probe.enabled {
        if !config.probe.is_configured() {
            errors.push(ValidationError::Missing {
                field: "probe.channel_url",
            });
        }
        if config.probe.interval_secs == 0 {
            errors.push(ValidationError::Zero {
                field: "probe.interval_secs",
            });
        }
        if config.status.file_path.trim().is_empty() {
            errors.push(ValidationError::Missing {
                field: "status.file_path",
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_bind(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress {
            field,
            value: value.to_string(),
        });
    }
}

fn check_url(errors: &mut Vec<ValidationError>, field: &'static str, value: &str, schemes: &[&str]) {
    match Url::parse(value) {
        Ok(url) if !schemes.contains(&url.scheme()) => errors.push(ValidationError::Url {
            field,
            value: value.to_string(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        }),
        Ok(url) if url.host_str().is_none() => errors.push(ValidationError::Url {
            field,
            value: value.to_string(),
            reason: "missing host".to_string(),
        }),
        Ok(_) => {}
        Err(e) => errors.push(ValidationError::Url {
            field,
            value: value.to_string(),
            reason: e.to_string(),
        }),
    }
}
