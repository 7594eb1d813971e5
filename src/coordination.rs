//! Cross-dependency retry serialization.
//!
//! A batch whose transaction rolled back is assumed to have cross-dependencies
//! with its neighbours. Before each execution attempt a batch waits until no
//! earlier batch is queued for retry and, when it is itself the retrying
//! batch, until all concurrently executing batches have drained. Conflicting
//! batches therefore replay one at a time in id order while untouched batches
//! beyond the conflicted range keep flowing.

use parking_lot::Mutex;
use std::collections::BTreeSet;
use tokio::sync::Notify;
use tracing::debug;

#[derive(Debug, Default)]
struct CoordState {
    /// Batch ids queued for retry, ordered.
    retrying: BTreeSet<usize>,
    /// Number of batches currently executing.
    executing: usize,
}

/// Shared retry-coordination state for one run.
#[derive(Debug, Default)]
pub(crate) struct Coordination {
    state: Mutex<CoordState>,
    notify: Notify,
}

impl Coordination {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Wait for clearance to execute batch `id`, then mark it executing.
    pub(crate) async fn acquire_slot(&self, id: usize) {
        loop {
            let notified = self.notify.notified();
            {
                let mut state = self.state.lock();
                let wait = match (
                    state.retrying.first().copied(),
                    state.retrying.last().copied(),
                ) {
                    (Some(first), Some(last)) => {
                        (first < id || (first == id && state.executing > 0)) && last >= id
                    }
                    _ => false,
                };
                if !wait {
                    state.executing += 1;
                    return;
                }
            }
            debug!(
                batch = id,
                "recoverable failure pending, waiting for other batches to complete"
            );
            notified.await;
        }
    }

    /// Batch `id` finished (committed or failed terminally).
    pub(crate) fn complete(&self, id: usize) {
        let mut state = self.state.lock();
        state.executing -= 1;
        state.retrying.remove(&id);
        drop(state);
        self.notify.notify_waiters();
    }

    /// Batch `id` rolled back and will retry.
    pub(crate) fn retry_later(&self, id: usize) {
        let mut state = self.state.lock();
        state.executing -= 1;
        state.retrying.insert(id);
        drop(state);
        self.notify.notify_waiters();
    }
}
