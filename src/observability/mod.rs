//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (health gauge, relay counters)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape on the management listener)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON optional) for machine parsing
//! - Request ID flows through the relay path via tower-http
//! - Metrics are cheap (atomic increments); recording without an installed
//!   recorder is a no-op

pub mod logging;
pub mod metrics;
