//! HTTP relay subsystem.
//!
//! # Data Flow
//! ```text
//! Relayed request (from the webhook relay client)
//!     → server.rs (Axum setup, request ID, timeout, body limit)
//!     → interceptor.rs (probe marker? resolve slot, acknowledge)
//!     → forward.rs (ordinary event → downstream service)
//!     → Response to the relay client
//! ```

pub mod forward;
pub mod interceptor;
pub mod server;

pub use forward::{ForwardError, Forwarder};
pub use interceptor::RelayStats;
pub use server::{RelayServer, RelayState};
