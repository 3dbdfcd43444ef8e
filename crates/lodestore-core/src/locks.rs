//! # Identity Locks
//!
//! One unlock scope per identity at a time. Acquisition never blocks: a
//! second scope on a held identity fails with `ConcurrentModification`.
//! The guard releases the identity on drop, which covers commit, rollback,
//! early return and unwinding panics alike.

use crate::types::{LodestoreError, ObjectId, Result};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Set of identities currently held by an unlock scope.
#[derive(Debug, Default, Clone)]
pub struct LockTable {
    held: Arc<Mutex<BTreeSet<ObjectId>>>,
}

impl LockTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock for `id`, or fail if another scope holds it.
    pub fn acquire(&self, id: &ObjectId) -> Result<IdentityGuard> {
        let mut held = self.held.lock();
        if !held.insert(id.clone()) {
            tracing::debug!(id = %id, "identity already locked");
            return Err(LodestoreError::ConcurrentModification(id.clone()));
        }
        Ok(IdentityGuard {
            id: id.clone(),
            held: Arc::clone(&self.held),
        })
    }

    #[must_use]
    pub fn is_locked(&self, id: &ObjectId) -> bool {
        self.held.lock().contains(id)
    }

    /// Number of identities currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.held.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.held.lock().is_empty()
    }
}

/// Proof of exclusive access to one identity. Releases it on drop.
#[derive(Debug)]
pub struct IdentityGuard {
    id: ObjectId,
    held: Arc<Mutex<BTreeSet<ObjectId>>>,
}

impl IdentityGuard {
    #[must_use]
    pub fn id(&self) -> &ObjectId {
        &self.id
    }
}

impl Drop for IdentityGuard {
    fn drop(&mut self) {
        self.held.lock().remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_fast() {
        let table = LockTable::new();
        let id = ObjectId::new("a");
        let guard = table.acquire(&id).expect("first");
        assert!(matches!(
            table.acquire(&id),
            Err(LodestoreError::ConcurrentModification(_))
        ));
        drop(guard);
        assert!(table.acquire(&id).is_ok());
    }

    #[test]
    fn distinct_identities_are_independent() {
        let table = LockTable::new();
        let _a = table.acquire(&ObjectId::new("a")).expect("a");
        let _b = table.acquire(&ObjectId::new("b")).expect("b");
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn released_on_unwind() {
        let table = LockTable::new();
        let id = ObjectId::new("a");
        let inner = table.clone();
        let inner_id = id.clone();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _guard = inner.acquire(&inner_id).expect("acquire");
            std::panic::resume_unwind(Box::new("boom"));
        }));
        assert!(outcome.is_err());
        assert!(!table.is_locked(&id));
        assert!(table.is_empty());
    }
}
