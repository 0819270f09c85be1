//! Pending call tracking
//!
//! Every outgoing call is correlated with its eventual reply through a table
//! keyed by call id.
//!
//! # Call Lifecycle
//!
//! 1. **Allocate ID**: The client takes the next value from its counter
//! 2. **Register**: A oneshot channel is created and its sender stored here
//! 3. **Send**: The request frame goes out on the socket
//! 4. **Wait**: The caller awaits the receiver held by its `PendingCall`
//! 5. **Resolve**: The receive loop matches the reply id and fulfils the sender
//!
//! An entry leaves the table exactly once: resolved by a reply, rejected by a
//! connection failure, or cancelled when the caller stops waiting (timeout or
//! dropped future). `PendingCall` cancels on drop, so no path leaves an entry
//! behind.
//!
//! # Locking
//!
//! The table sits behind a `std::sync::Mutex`. No critical section awaits,
//! and cancellation runs from `Drop`, where an async lock is not an option.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use wingrpc_core::{CallId, Error, Result};

type Waiters = HashMap<CallId, oneshot::Sender<Result<Value>>>;

/// Table of calls awaiting a reply
#[derive(Clone, Default)]
pub(crate) struct PendingCalls {
    waiters: Arc<Mutex<Waiters>>,
}

impl PendingCalls {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Waiters> {
        // A panic while holding the lock cannot leave the map half-updated,
        // so a poisoned table is still consistent.
        self.waiters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a call and return the handle its caller waits on
    ///
    /// Ids come from a counter that never repeats, so `id` is never already
    /// present.
    pub fn register(&self, id: CallId) -> PendingCall {
        let (tx, rx) = oneshot::channel();
        let previous = self.lock().insert(id, tx);
        debug_assert!(previous.is_none(), "call id {} registered twice", id);

        PendingCall {
            id,
            rx,
            calls: self.clone(),
        }
    }

    /// Fulfil the call with `id`, if it is still waiting
    ///
    /// Returns `false` for an orphaned reply: no call with that id is
    /// pending, either because it never existed or because it already timed
    /// out, was cancelled, or was answered. Orphans are logged and dropped.
    pub fn resolve(&self, id: CallId, outcome: Result<Value>) -> bool {
        let waiter = self.lock().remove(&id);
        match waiter {
            Some(tx) => {
                // The receiver may have been dropped between our removal and
                // now; the caller is gone either way.
                let _ = tx.send(outcome);
                true
            }
            None => {
                tracing::warn!(call_id = %id, "Dropping reply for unknown call id");
                false
            }
        }
    }

    /// Remove a call without fulfilling it
    pub fn cancel(&self, id: CallId) -> bool {
        self.lock().remove(&id).is_some()
    }

    /// Reject every pending call with `error`
    ///
    /// Returns the number of calls rejected.
    pub fn fail_all(&self, error: Error) -> usize {
        let drained: Vec<_> = self.lock().drain().collect();
        let count = drained.len();
        for (_, tx) in drained {
            let _ = tx.send(Err(error.clone()));
        }
        count
    }

    /// Number of calls currently waiting
    pub fn len(&self) -> usize {
        self.lock().len()
    }
}

/// A registered call, owned by the caller waiting for its reply
///
/// Dropping it removes the entry from the table if it is still there.
pub(crate) struct PendingCall {
    id: CallId,
    rx: oneshot::Receiver<Result<Value>>,
    calls: PendingCalls,
}

impl PendingCall {
    pub fn id(&self) -> CallId {
        self.id
    }

    /// Wait for the reply
    ///
    /// Cancel-safe: if this future is dropped the call stays registered until
    /// the `PendingCall` itself is dropped.
    pub async fn wait(&mut self) -> Result<Value> {
        match (&mut self.rx).await {
            Ok(outcome) => outcome,
            // Sender dropped without a value: the table went away with the
            // connection.
            Err(_) => Err(Error::ConnectionClosed),
        }
    }
}

impl Drop for PendingCall {
    fn drop(&mut self) {
        self.calls.cancel(self.id);
    }
}
