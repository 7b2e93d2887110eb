//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validated config → Build table, relay, emitter, metrics → Spawn tasks
//!
//! Shutdown (shutdown.rs):
//!     Trigger → Servers stop accepting and drain → Driver abandons probe
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{Sidecar, SidecarHandle, StartupError};
