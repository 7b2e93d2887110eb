//! Health-checking relay sidecar.
//!
//! Relays webhook events from a relay client to a downstream service and
//! proves the whole path end to end by injecting uniquely identified probes
//! into the upstream channel and catching them on the way back.

// Core subsystems
pub mod config;
pub mod health;
pub mod http;

// Outer surfaces
pub mod management;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::SidecarConfig;
pub use http::RelayServer;
pub use lifecycle::{Shutdown, Sidecar};
