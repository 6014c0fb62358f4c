//! Pending Lock Table
//!
//! Maps artifact base names to the single-fire signal their waiters block on.
//!
//! A name has at most one outstanding generation. Waiters on the same name
//! share it; once it is released, the next `get_or_create` starts a new one.

use dashmap::DashMap;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// One generation of waiting on an artifact.
///
/// Clones share the same signal. Unlocking is idempotent and wakes every
/// clone, including ones that start waiting after the fact.
#[derive(Debug, Clone, Default)]
pub struct PendingLock {
    signal: CancellationToken,
}

impl PendingLock {
    /// Create a new lock in the locked state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Release every observer of this lock. Later calls are no-ops.
    pub fn unlock(&self) {
        self.signal.cancel();
    }

    /// Whether `unlock` has been called.
    pub fn is_unlocked(&self) -> bool {
        self.signal.is_cancelled()
    }

    /// Resolves once the lock is unlocked.
    pub fn unlocked(&self) -> WaitForCancellationFuture<'_> {
        self.signal.cancelled()
    }
}

/// Concurrency-safe table of pending locks keyed by artifact base name.
#[derive(Debug, Default)]
pub struct LockTable {
    locks: DashMap<String, PendingLock>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the current generation for `name`, creating one if there is none
    /// or the stored one was already unlocked.
    pub fn get_or_create(&self, name: &str) -> PendingLock {
        let mut entry = self.locks.entry(name.to_string()).or_default();
        if entry.is_unlocked() {
            tracing::debug!(name = %name, "Replacing stale pending lock");
            *entry = PendingLock::new();
        }
        entry.clone()
    }

    /// Look up the current generation for `name` without creating one.
    pub fn get(&self, name: &str) -> Option<PendingLock> {
        self.locks
            .get(name)
            .map(|entry| entry.value().clone())
            .filter(|lock| !lock.is_unlocked())
    }

    /// Unlock and drop the current generation for `name`.
    ///
    /// Returns false when nobody was waiting on `name`.
    pub fn release(&self, name: &str) -> bool {
        match self.locks.remove(name) {
            Some((_, lock)) => {
                let was_locked = !lock.is_unlocked();
                lock.unlock();
                was_locked
            }
            None => false,
        }
    }

    /// Drop the entry for `name` if its lock has already been unlocked.
    pub fn remove_if_unlocked(&self, name: &str) -> bool {
        self.locks
            .remove_if(name, |_, lock| lock.is_unlocked())
            .is_some()
    }

    /// Number of names with an entry in the table.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
