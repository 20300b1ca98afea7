//! Explicit registry of in-flight reconciliations.
//!
//! Owned by the caller and passed by reference into a pass. Independent
//! registries never interact, so several can coexist in one process.

use std::collections::BTreeSet;
use std::sync::Mutex;

use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum LeaseError {
    #[error("stream '{name}' already has a reconciliation in flight")]
    AlreadyInFlight { name: String },
}

#[derive(Debug, Default)]
pub struct InFlightRegistry {
    names: Mutex<BTreeSet<String>>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lease every name, all or nothing. Released when the lease drops.
    pub fn acquire<I, S>(&self, names: I) -> Result<PassLease<'_>, LeaseError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let wanted: BTreeSet<String> = names.into_iter().map(Into::into).collect();
        let mut held = self.names.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(name) = wanted.iter().find(|n| held.contains(*n)) {
            return Err(LeaseError::AlreadyInFlight { name: name.clone() });
        }
        held.extend(wanted.iter().cloned());

        Ok(PassLease {
            registry: self,
            names: wanted,
        })
    }

    pub fn is_in_flight(&self, name: &str) -> bool {
        self.names
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(name)
    }
}

/// Names held by one pass.
#[derive(Debug)]
pub struct PassLease<'a> {
    registry: &'a InFlightRegistry,
    names: BTreeSet<String>,
}

impl PassLease<'_> {
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

impl Drop for PassLease<'_> {
    fn drop(&mut self) {
        let mut held = self
            .registry
            .names
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for name in &self.names {
            held.remove(name);
        }
    }
}
