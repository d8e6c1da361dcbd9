//! Pending-call table: correlation ID to single-resolution waiter.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;
use tracing::debug;

use crate::error::RpcError;

/// Concurrently accessed map of in-flight calls.
///
/// Each entry is a one-shot sender; the response router fires it with the
/// raw response text and the dispatcher owns the receiving end. An entry is
/// removed by whichever of router/timeout resolves it first, and
/// unconditionally by the dispatcher when the wait ends, so abandoned calls
/// never accumulate.
#[derive(Debug, Default)]
pub struct PendingCalls {
    inner: Mutex<HashMap<u64, oneshot::Sender<String>>>,
}

impl PendingCalls {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<u64, oneshot::Sender<String>>> {
        // The router must keep running even if some caller panicked while
        // holding the lock; the map itself stays structurally sound.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a waiter for `id` and return the receiving end.
    ///
    /// Fails if `id` is already in flight. The allocator keeps that from
    /// happening unless a call outlives a full ID wraparound.
    pub fn register(&self, id: u64) -> Result<oneshot::Receiver<String>, RpcError> {
        let mut table = self.table();
        if table.contains_key(&id) {
            return Err(RpcError::DuplicateRequestId(id));
        }
        let (tx, rx) = oneshot::channel();
        table.insert(id, tx);
        debug!(id, in_flight = table.len(), "registered pending call");
        Ok(rx)
    }

    /// Deliver `payload` to the waiter for `id`, if one exists.
    ///
    /// Returns false without side effects when no waiter matches; the caller
    /// decides how to report the orphan.
    pub fn resolve(&self, id: u64, payload: String) -> bool {
        match self.table().remove(&id) {
            Some(tx) => {
                // A send error only means the caller stopped listening
                // (timed out or dropped); losing that race is fine.
                let _ = tx.send(payload);
                true
            }
            None => false,
        }
    }

    /// Discard any entry for `id`. Idempotent.
    pub fn remove(&self, id: u64) {
        self.table().remove(&id);
    }

    /// Number of calls currently in flight.
    pub fn len(&self) -> usize {
        self.table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
