//! Per-key exclusive locks
//!
//! The engine serializes work per item (approvals and anything touching the
//! granted set) and per wallet (balance read-modify-write). `KeyedLocks`
//! hands out one mutex per key, created on first use, so unrelated items and
//! wallets never contend.
//!
//! # Deadlock Avoidance
//!
//! `with_locks` always acquires keys in ascending order, and the engine only
//! ever nests wallet locks inside an item lock, never the other way round.

use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;

/// One mutex per key, created lazily
#[derive(Debug)]
pub struct KeyedLocks<K: Eq + Hash> {
    locks: DashMap<K, Arc<Mutex<()>>>,
}

impl<K> KeyedLocks<K>
where
    K: Eq + Hash + Ord + Clone,
{
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    fn handle(&self, key: &K) -> Arc<Mutex<()>> {
        Arc::clone(
            self.locks
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        )
    }

    /// Run `f` while holding the lock for `key`
    pub fn with_lock<R>(&self, key: &K, f: impl FnOnce() -> R) -> R {
        let mutex = self.handle(key);
        // A panic inside another holder does not invalidate the unit type.
        let _guard = mutex.lock().unwrap_or_else(PoisonError::into_inner);
        f()
    }

    /// Run `f` while holding the locks for every key in `keys`
    ///
    /// Duplicate keys are locked once.
    pub fn with_locks<R>(&self, keys: impl IntoIterator<Item = K>, f: impl FnOnce() -> R) -> R {
        let mut keys: Vec<K> = keys.into_iter().collect();
        keys.sort();
        keys.dedup();

        let mutexes: Vec<Arc<Mutex<()>>> = keys.iter().map(|key| self.handle(key)).collect();
        let _guards: Vec<MutexGuard<'_, ()>> = mutexes
            .iter()
            .map(|mutex| mutex.lock().unwrap_or_else(PoisonError::into_inner))
            .collect();
        f()
    }
}

impl<K> Default for KeyedLocks<K>
where
    K: Eq + Hash + Ord + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
