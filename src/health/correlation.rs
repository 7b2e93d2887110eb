//! Correlation of outstanding probes with their round-trip signal.
//!
//! A probe leaves through the relay channel and comes back, if at all, as an
//! unrelated inbound request. The table maps each outstanding probe id to a
//! one-shot slot so the inbound side can wake the waiting emitter.
//!
//! # Invariants
//! - An entry exists iff the probe with that id is outstanding
//! - The lock is held for the map mutation only, never across an await
//! - Resolving never blocks, even when the waiter has already given up
//! - Removal is idempotent

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use thiserror::Error;
use tokio::sync::oneshot;

/// Receiving half of a signal slot, awaited by the emitter.
pub type Slot = oneshot::Receiver<()>;

/// Error type for table operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CorrelationError {
    /// The id is already outstanding; the existing entry was left untouched.
    #[error("probe id {0} is already registered")]
    Duplicate(String),
}

/// Shared registry of outstanding probe ids.
#[derive(Debug, Default)]
pub struct CorrelationTable {
    slots: Mutex<HashMap<String, oneshot::Sender<()>>>,
}

impl CorrelationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and store a fresh slot for `id`.
    pub fn register(&self, id: &str) -> Result<Slot, CorrelationError> {
        let mut slots = self.lock();
        if slots.contains_key(id) {
            return Err(CorrelationError::Duplicate(id.to_string()));
        }
        let (tx, rx) = oneshot::channel();
        slots.insert(id.to_string(), tx);
        Ok(rx)
    }

    /// Signal the slot for `id`, if one is outstanding.
    ///
    /// Returns `true` when an entry was found. The entry is consumed: a
    /// oneshot sender can fire only once, so a second resolve of the same id
    /// reports `false`.
    pub fn resolve(&self, id: &str) -> bool {
        let sender = self.lock().remove(id);
        match sender {
            Some(tx) => {
                if tx.send(()).is_err() {
                    tracing::debug!(probe_id = %id, "Probe resolved after its waiter gave up");
                }
                true
            }
            None => false,
        }
    }

    /// Delete the entry for `id`. Safe to call when absent.
    pub fn remove(&self, id: &str) {
        self.lock().remove(id);
    }

    /// Whether `id` is currently outstanding.
    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }

    /// Number of outstanding probes.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Every critical section is a single map operation, so a poisoned map
    // is still consistent.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, oneshot::Sender<()>>> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
