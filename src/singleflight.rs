//! Per-key mutual exclusion for cache repopulation.
//!
//! The requirement is "at most one in-flight refill per key": concurrent
//! misses for the same key must collapse into a single backend fetch, while
//! misses for unrelated keys refill in parallel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// A registry of per-key async locks.
///
/// `acquire` hands out a guard for the key's lock, creating the lock on
/// first use. Entries are removed again once the last holder releases, so
/// the map only ever contains keys with an active or contended refill.
#[derive(Default)]
pub(crate) struct KeyedMutex {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl KeyedMutex {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Lock the given key, waiting if another caller holds it.
    pub(crate) async fn acquire(&self, key: &str) -> KeyGuard<'_> {
        let lock = {
            let mut locks = self.locks.lock().expect("keyed mutex poisoned");
            Arc::clone(
                locks
                    .entry(key.to_owned())
                    .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
            )
        };

        let guard = Arc::clone(&lock).lock_owned().await;
        KeyGuard {
            registry: self,
            key: key.to_owned(),
            lock: Some(lock),
            _guard: guard,
        }
    }
}

/// Holds a key's lock; releasing it drops the registry entry when no other
/// caller is waiting on the same key.
pub(crate) struct KeyGuard<'a> {
    registry: &'a KeyedMutex,
    key: String,
    lock: Option<Arc<AsyncMutex<()>>>,
    _guard: OwnedMutexGuard<()>,
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        let lock = self.lock.take().expect("guard dropped twice");
        let mut locks = self.registry.locks.lock().expect("keyed mutex poisoned");
        // Three strong refs mean no waiter is queued: the map entry, the
        // clone taken here, and the one inside the still-live owned guard.
        // A waiter cloning the Arc does so under the same map lock, so the
        // count cannot change underneath us.
        if Arc::strong_count(&lock) == 3 {
            locks.remove(&self.key);
        }
    }
}
