//! Per-key async mutual exclusion
//!
//! Serialises work on the same cluster or cache file inside one process while
//! letting unrelated keys proceed in parallel. A key's entry is dropped once
//! its last holder or waiter is gone, so the map only tracks keys in use.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// A set of async mutexes addressed by string key
#[derive(Debug, Default)]
pub struct KeyedLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

/// Holds the lock for one key until dropped
#[must_use = "the key is unlocked as soon as the guard is dropped"]
#[derive(Debug)]
pub struct KeyedLockGuard<'a> {
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyedLockGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Waiters hold their own clone of the Arc; only the map's copy left
        // means nobody else wants this key.
        self.locks
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

impl KeyedLocks {
    /// Create an empty lock set
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `key`, waiting if another holder exists
    ///
    /// The lock is released when the returned guard is dropped.
    pub async fn lock(&self, key: &str) -> KeyedLockGuard<'_> {
        // Clone the Arc out before awaiting so no DashMap shard guard is held
        // across the await point.
        let mutex = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = mutex.lock_owned().await;
        KeyedLockGuard {
            locks: &self.locks,
            key: key.to_string(),
            guard: Some(guard),
        }
    }

    /// Number of keys currently held or awaited
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Whether no key is held or awaited
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
