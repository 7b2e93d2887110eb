//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Health cycle (driver.rs):
//!     Fixed-period timer (first run immediate)
//!     → probe.rs registers a slot in correlation.rs, posts the probe
//!       to the relay channel, waits under a deadline
//!     → status.rs writes the status file, gauge updated
//!
//! Round-trip (http::interceptor):
//!     Relay echoes the probe back to the inbound listener
//!     → correlation.rs resolves the slot
//!     → probe.rs wait unblocks
//! ```
//!
//! # Design Decisions
//! - The correlation table is an explicit object shared via Arc, not a global
//! - Probe ids are UUID v4; uniqueness alone keeps concurrent probes apart
//! - Every wait in the emitter carries a deadline

pub mod correlation;
pub mod driver;
pub mod probe;
pub mod status;

pub use correlation::{CorrelationError, CorrelationTable};
pub use driver::{DriverState, HealthCycleDriver, HealthReport};
pub use probe::{ProbeEmitter, ProbeError, ProbePayload, HEALTH_CHECK_ID_HEADER};
pub use status::{HealthOutcome, HealthStatus, StatusFile};
