//! Keyed mutual exclusion.
//!
//! [`KeyedLocks`] hands out one lock per string key so that work on the same
//! key is serialised while work on different keys proceeds concurrently. The
//! registry-wide mutex is only held to look up or insert a key's lock, never
//! while waiting on it.
//!
//! Locks are created on first use and kept for the registry's lifetime. They
//! are not re-entrant: acquiring a key already held by the same task never
//! completes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as KeyMutex, OwnedMutexGuard};
use tracing::trace;

/// Registry of per-key locks.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    store: Mutex<HashMap<String, Arc<KeyMutex<()>>>>,
}

impl KeyedLocks {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`.
    ///
    /// The lock is released when the returned guard is dropped.
    pub async fn acquire(&self, key: &str) -> KeyGuard {
        trace!(key, "Locking");
        let guard = self.get(key).lock_owned().await;
        trace!(key, "Locked");
        KeyGuard {
            key: key.to_string(),
            _guard: guard,
        }
    }

    /// Release a guard explicitly.
    pub fn release(guard: KeyGuard) {
        drop(guard);
    }

    /// Number of keys that have been locked at least once.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no key has been locked yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The lock for `key`, created if missing. No guarantee of its state.
    fn get(&self, key: &str) -> Arc<KeyMutex<()>> {
        // A panic while holding the map lock cannot leave the map inconsistent:
        // the only mutation is a single insert.
        let mut store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(store.entry(key.to_string()).or_default())
    }
}

/// Exclusive access to one key; unlocks on drop.
#[derive(Debug)]
pub struct KeyGuard {
    key: String,
    _guard: OwnedMutexGuard<()>,
}

impl KeyGuard {
    /// The key this guard holds.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        trace!(key = %self.key, "Unlocked");
    }
}
