//! Configuration loading from disk and the process environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::SidecarConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Environment variables understood by the sidecar.
pub mod env {
    pub const CHANNEL_URL: &str = "SMEE_CHANNEL_URL";
    pub const DOWNSTREAM_URL: &str = "DOWNSTREAM_SERVICE_URL";
    pub const INTERVAL_SECS: &str = "HEALTH_CHECK_INTERVAL_SECONDS";
    pub const TIMEOUT_SECS: &str = "HEALTH_CHECK_TIMEOUT_SECONDS";
    /// Older name for the probe timeout, still honored.
    pub const LEGACY_TIMEOUT_SECS: &str = "HEALTHZ_TIMEOUT_SECONDS";
    pub const HEALTH_FILE: &str = "HEALTH_FILE_PATH";
    pub const INSECURE_SKIP_VERIFY: &str = "INSECURE_SKIP_VERIFY";
}

/// Parse a TOML configuration file without validating it.
pub fn parse_config_file(path: &Path) -> Result<SidecarConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Apply environment overrides from `lookup`, then validate.
pub fn finalize<F>(mut config: SidecarConfig, lookup: F) -> Result<SidecarConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    apply_env_overrides(&mut config, lookup);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Apply environment overrides using `lookup` to read variables.
///
/// Invalid numeric values are logged and the existing value is kept.
pub fn apply_env_overrides<F>(config: &mut SidecarConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup(env::CHANNEL_URL).filter(|v| !v.is_empty()) {
        config.probe.channel_url = url;
    }
    if let Some(url) = lookup(env::DOWNSTREAM_URL).filter(|v| !v.is_empty()) {
        config.downstream.url = url;
    }
    if let Some(path) = lookup(env::HEALTH_FILE).filter(|v| !v.is_empty()) {
        config.status.file_path = path;
    }
    if let Some(secs) = positive_secs(&lookup, env::INTERVAL_SECS) {
        config.probe.interval_secs = secs;
    }
    // The current name wins over the legacy one when both are set.
    if let Some(secs) = positive_secs(&lookup, env::TIMEOUT_SECS)
        .or_else(|| positive_secs(&lookup, env::LEGACY_TIMEOUT_SECS))
    {
        config.probe.timeout_secs = secs;
    }
    if let Some(flag) = lookup(env::INSECURE_SKIP_VERIFY) {
        config.probe.insecure_skip_verify = flag == "true";
    }
}

fn positive_secs<F>(lookup: &F, key: &str) -> Option<u64>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Some(secs),
        _ => {
            tracing::warn!(
                variable = key,
                value = %raw,
                "Ignoring invalid duration, expected a positive number of seconds"
            );
            None
        }
    }
}
