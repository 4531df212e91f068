//! Single-flight guard keyed by purchase id

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// Set of purchase ids with an operation in progress
#[derive(Clone, Default)]
pub struct InFlight {
    active: Arc<Mutex<HashSet<Uuid>>>,
}

/// Held for the duration of an operation; releases the id on drop
#[must_use]
pub struct InFlightPermit {
    active: Arc<Mutex<HashSet<Uuid>>>,
    id: Uuid,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` if an operation on `id` is already running.
    pub fn try_acquire(&self, id: Uuid) -> Option<InFlightPermit> {
        if !lock(&self.active).insert(id) {
            return None;
        }
        Some(InFlightPermit {
            active: Arc::clone(&self.active),
            id,
        })
    }

    pub fn is_active(&self, id: Uuid) -> bool {
        lock(&self.active).contains(&id)
    }
}

impl Drop for InFlightPermit {
    fn drop(&mut self) {
        lock(&self.active).remove(&self.id);
    }
}

// The set stays consistent even if a holder panicked mid-operation.
fn lock(active: &Mutex<HashSet<Uuid>>) -> MutexGuard<'_, HashSet<Uuid>> {
    active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
