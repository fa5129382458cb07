//! MutexKv - Named mutexes for serialising mutations of shared remote objects
//!
//! Each key maps to a lazily created async mutex that lives for the rest of
//! the process. Locks are released when their guard drops, so every exit
//! path of a resource operation unlocks.
//!
//! Multiple keys are always acquired through [`MutexKv::lock_many`], which
//! de-duplicates them and takes them in ascending order. Two callers locking
//! overlapping sets therefore agree on order and cannot deadlock.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use log::debug;
use tokio::sync::OwnedMutexGuard;

#[derive(Debug, Default)]
pub struct MutexKv {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

/// Held lock on a single key; unlocks on drop
#[derive(Debug)]
pub struct KeyGuard {
    key: String,
    _guard: OwnedMutexGuard<()>,
}

impl KeyGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        debug!("Unlocking {:?}", self.key);
    }
}

/// Set of held locks, released in reverse acquisition order on drop
#[derive(Debug, Default)]
pub struct LockSet {
    guards: Vec<KeyGuard>,
}

impl LockSet {
    /// Keys held, in acquisition order
    pub fn keys(&self) -> Vec<&str> {
        self.guards.iter().map(|g| g.key()).collect()
    }

    pub fn len(&self) -> usize {
        self.guards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }
}

impl Drop for LockSet {
    fn drop(&mut self) {
        while let Some(guard) = self.guards.pop() {
            drop(guard);
        }
    }
}

impl MutexKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mutex for a key, created on first use
    fn get(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        // The map is only touched for lookups and inserts, so a poisoned
        // lock still holds a consistent map.
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Lock a single key, waiting until it is free
    pub async fn lock(&self, key: &str) -> KeyGuard {
        debug!("Locking {:?}", key);
        let guard = self.get(key).lock_owned().await;
        debug!("Locked {:?}", key);
        KeyGuard {
            key: key.to_string(),
            _guard: guard,
        }
    }

    /// Lock several keys in ascending order, skipping duplicates
    pub async fn lock_many<I, S>(&self, keys: I) -> LockSet
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ordered: BTreeSet<String> = keys.into_iter().map(Into::into).collect();
        let mut set = LockSet::default();
        for key in &ordered {
            set.guards.push(self.lock(key).await);
        }
        set
    }

    /// Whether a key is currently held
    pub fn is_locked(&self, key: &str) -> bool {
        let locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.get(key).is_some_and(|m| m.try_lock().is_err())
    }

    /// Number of keys ever locked
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
