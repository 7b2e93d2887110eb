//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize, environment overrides)
//!     → validation.rs (semantic checks)
//!     → SidecarConfig (validated, immutable)
//!     → cloned into each subsystem at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable for the lifetime of the process
//! - All fields have defaults to allow minimal configs
//! - Environment variables override the file so the sidecar can run with
//!   no file at all inside a pod
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{apply_env_overrides, finalize, parse_config_file, ConfigError};
pub use schema::{
    DownstreamConfig, LogFormat, ManagementConfig, ObservabilityConfig, ProbeConfig, RelayConfig,
    SidecarConfig, StatusConfig,
};
pub use validation::{validate_config, ValidationError};
