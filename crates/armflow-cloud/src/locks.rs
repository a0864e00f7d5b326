//! Named resource locks
//!
//! Serializes mutations issued by independently scheduled operations against
//! the same remote resource. Lock names are normalized (trimmed, lower-cased)
//! so that casing drift in resource ids never splits one resource into two
//! locks.
//!
//! Entries are never removed: the first use of a name allocates a mutex that
//! lives as long as the registry. That is fine for a provisioning run, which
//! touches a bounded set of resources.
//!
//! Release happens through the guards: [`NamedLock::unlock`] and
//! [`LockSet::unlock`] consume the guard, and dropping a guard releases it on
//! every other exit path (`?`, early return, panic unwinding). Unlocking a
//! name that is not held is therefore not expressible.
//!
//! A task must not call [`LockRegistry::lock`] for a name it already holds;
//! that waits forever. Use [`LockRegistry::lock_multiple`] to take several
//! names at once, which deduplicates and orders them.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Table of named mutexes
#[derive(Debug, Default)]
pub struct LockRegistry {
    entries: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize a lock name
    pub fn normalize(name: &str) -> String {
        name.trim().to_lowercase()
    }

    fn entry(&self, name: &str) -> Arc<AsyncMutex<()>> {
        // The map is only touched for lookups and inserts, which cannot leave
        // it half-updated, so a poisoned guard is still usable.
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Wait until `name` is free, then hold it
    pub async fn lock(&self, name: &str) -> NamedLock {
        let name = Self::normalize(name);
        let mutex = self.entry(&name);
        tracing::debug!("Acquiring lock {:?}", name);
        let guard = mutex.lock_owned().await;
        tracing::debug!("Acquired lock {:?}", name);
        NamedLock {
            name,
            guard: Some(guard),
        }
    }

    /// Hold every name in `names`
    ///
    /// Names are normalized, deduplicated and acquired in sorted order, so two
    /// callers locking overlapping sets in any order cannot deadlock.
    pub async fn lock_multiple<I, S>(&self, names: I) -> LockSet
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ordered: BTreeSet<String> = names
            .into_iter()
            .map(|n| Self::normalize(n.as_ref()))
            .collect();

        let mut locks = Vec::with_capacity(ordered.len());
        for name in ordered {
            locks.push(self.lock(&name).await);
        }
        LockSet { locks }
    }

    /// Whether some caller currently holds `name`
    pub fn is_locked(&self, name: &str) -> bool {
        let name = Self::normalize(name);
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .get(&name)
            .map(|m| m.try_lock().is_err())
            .unwrap_or(false)
    }

    /// Number of names ever locked through this registry
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A held lock; released on [`unlock`](Self::unlock) or drop
#[derive(Debug)]
pub struct NamedLock {
    name: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl NamedLock {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unlock(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.guard.take().is_some() {
            tracing::debug!("Released lock {:?}", self.name);
        }
    }
}

impl Drop for NamedLock {
    fn drop(&mut self) {
        self.release();
    }
}

/// A set of held locks, acquired in sorted order
#[derive(Debug, Default)]
pub struct LockSet {
    locks: Vec<NamedLock>,
}

impl LockSet {
    /// Held names in acquisition order
    pub fn names(&self) -> Vec<&str> {
        self.locks.iter().map(NamedLock::name).collect()
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    /// Release every lock in the set
    pub fn unlock(self) {
        drop(self);
    }
}
