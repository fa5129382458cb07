//! Named locks held across ARM mutations
//!
//! Resources that modify a shared parent or a referenced collection lock
//! every affected resource by `"{resource_type}.{name}"` for the duration of
//! the remote call and its completion polling.

use strata_core::mutex_kv::{KeyGuard, LockSet, MutexKv};

pub fn lock_key(resource_type: &str, name: &str) -> String {
    format!("{}.{}", resource_type, name)
}

#[derive(Default)]
pub struct ArmLocks {
    kv: MutexKv,
}

impl ArmLocks {
    pub fn new() -> Self {
        Self { kv: MutexKv::new() }
    }

    pub async fn lock_by_name(&self, resource_type: &str, name: &str) -> KeyGuard {
        self.kv.lock(&lock_key(resource_type, name)).await
    }

    /// Lock a resource together with every resource it references
    ///
    /// The whole set is acquired in one sorted pass, so callers locking
    /// overlapping sets never deadlock.
    pub async fn lock_with_references<'a>(
        &self,
        resource_type: &str,
        name: &str,
        references: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> LockSet {
        let keys = std::iter::once(lock_key(resource_type, name))
            .chain(references.into_iter().map(|(t, n)| lock_key(t, n)));
        self.kv.lock_many(keys).await
    }

    pub fn is_locked(&self, resource_type: &str, name: &str) -> bool {
        self.kv.is_locked(&lock_key(resource_type, name))
    }
}
