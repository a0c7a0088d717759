//! Per-poll mutual exclusion.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Keyed async mutexes, one per poll id.
///
/// Finalization, vote recording and queue mutation for the same poll take
/// the same lock, so they never interleave inside one process. Entries nobody holds are
/// pruned on the next acquisition.
#[derive(Default)]
pub struct PollLocks {
    inner: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl PollLocks {
    /// Empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for and hold the lock for `poll_id`.
    pub async fn acquire(&self, poll_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut table = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            table.retain(|key, lock| key == poll_id || Arc::strong_count(lock) > 1);
            Arc::clone(table.entry(poll_id.to_owned()).or_default())
        };
        lock.lock_owned().await
    }

    /// Number of tracked keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no keys are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
