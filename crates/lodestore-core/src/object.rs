//! # Locked Objects
//!
//! A `LockedObject` is an immutable view of one persisted (or about to be
//! persisted) domain object. Its values can only change through an
//! `Unlocked` handle:
//!
//! ```text
//! Locked --unlock--> Unlocked --commit--> Locked (new snapshot)
//!                    Unlocked --drop / error / cancel--> Locked (unchanged)
//! ```
//!
//! The handle holds the identity lock and a private draft. Nothing the draft
//! does is visible to other readers until `commit` swaps the snapshot, and
//! dropping the handle without committing leaves storage and index untouched.

use crate::deadline::Deadline;
use crate::locks::IdentityGuard;
use crate::mutation::MutationEngine;
use crate::registry::TypeSchema;
use crate::repository::Repository;
use crate::types::{Attributes, ObjectId, Result, TypeName};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Where an object's current snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectState {
    /// Constructed, never committed.
    New,
    /// Loaded from, or committed to, the record store.
    Stored,
    /// Hydrated from an index row.
    Indexed,
    /// Removed from storage and index.
    Destroyed,
}

/// Immutable read view of a domain object.
#[derive(Debug, Clone)]
pub struct LockedObject {
    id: ObjectId,
    model: TypeName,
    values: Arc<Attributes>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    state: ObjectState,
}

impl LockedObject {
    /// A fresh, unsaved object with a newly generated identity.
    pub(crate) fn new(model: TypeName) -> Self {
        Self::from_parts(
            ObjectId::generate(),
            model,
            Arc::new(Attributes::new()),
            None,
            None,
            ObjectState::New,
        )
    }

    pub(crate) fn from_parts(
        id: ObjectId,
        model: TypeName,
        values: Arc<Attributes>,
        created_at: Option<DateTime<Utc>>,
        updated_at: Option<DateTime<Utc>>,
        state: ObjectState,
    ) -> Self {
        Self {
            id,
            model,
            values,
            created_at,
            updated_at,
            state,
        }
    }

    #[must_use]
    pub fn id(&self) -> &ObjectId {
        &self.id
    }

    #[must_use]
    pub fn model(&self) -> &TypeName {
        &self.model
    }

    /// The current snapshot.
    #[must_use]
    pub fn values(&self) -> &Attributes {
        &self.values
    }

    /// First value of an attribute.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name)
    }

    #[must_use]
    pub fn get_all(&self, name: &str) -> &[String] {
        self.values.get_all(name)
    }

    /// Time of the first commit.
    #[must_use]
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    /// Time of the latest commit.
    #[must_use]
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    #[must_use]
    pub fn state(&self) -> ObjectState {
        self.state
    }

    #[must_use]
    pub fn is_new(&self) -> bool {
        self.state == ObjectState::New
    }

    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.state == ObjectState::Destroyed
    }

    /// Swap in a committed snapshot.
    pub(crate) fn replace_snapshot(
        &mut self,
        values: Attributes,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) {
        self.values = Arc::new(values);
        self.created_at = Some(created_at);
        self.updated_at = Some(updated_at);
        self.state = ObjectState::Stored;
    }

    pub(crate) fn mark_destroyed(&mut self) {
        self.state = ObjectState::Destroyed;
    }

    // =========================================================================
    // UNLOCK SCOPES
    // =========================================================================

    /// Open an unlock scope.
    ///
    /// Fails with `ConcurrentModification` if another scope holds this
    /// identity, or `UnknownType` if the repository does not know the type.
    pub fn unlock<'a>(&'a mut self, repo: &'a Repository) -> Result<Unlocked<'a>> {
        let schema = repo.registry().schema(self.model.as_str())?;
        let guard = repo.locks().acquire(&self.id)?;
        tracing::debug!(id = %self.id, model = %self.model, "unlocked");
        let draft = Attributes::clone(&self.values);
        Ok(Unlocked {
            object: self,
            repo,
            schema,
            draft,
            deadline: None,
            finished: false,
            _guard: guard,
        })
    }

    /// Run `block` inside an unlock scope and commit if it succeeds.
    ///
    /// An `Err` from the block is returned unchanged and nothing is committed.
    pub fn unlock_and_mutate<T, F>(&mut self, repo: &Repository, block: F) -> Result<T>
    where
        F: FnOnce(&mut Unlocked<'_>) -> Result<T>,
    {
        let mut handle = self.unlock(repo)?;
        let out = block(&mut handle)?;
        handle.commit()?;
        Ok(out)
    }

    /// Remove the object's record and index document.
    pub fn unlock_and_destroy(&mut self, repo: &Repository) -> Result<()> {
        self.unlock(repo)?.destroy()
    }
}

// =============================================================================
// UNLOCKED HANDLE
// =============================================================================

/// Scoped mutable handle over a draft copy of an object's values.
///
/// Holds the identity lock until dropped.
pub struct Unlocked<'a> {
    object: &'a mut LockedObject,
    repo: &'a Repository,
    schema: Arc<TypeSchema>,
    draft: Attributes,
    deadline: Option<Deadline>,
    finished: bool,
    _guard: IdentityGuard,
}

impl std::fmt::Debug for Unlocked<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Unlocked")
            .field("id", &self.object.id)
            .field("draft", &self.draft)
            .finish_non_exhaustive()
    }
}

impl Unlocked<'_> {
    #[must_use]
    pub fn id(&self) -> &ObjectId {
        &self.object.id
    }

    /// The draft values.
    #[must_use]
    pub fn values(&self) -> &Attributes {
        &self.draft
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.draft.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.draft.set(name, value);
        self
    }

    pub fn set_all<I, V>(&mut self, name: impl Into<String>, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.draft.set_all(name, values);
        self
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.draft.push(name, value);
        self
    }

    pub fn remove(&mut self, name: &str) -> &mut Self {
        self.draft.remove(name);
        self
    }

    /// Cancel the commit or destroy once `deadline` passes.
    pub fn with_deadline(&mut self, deadline: Deadline) -> &mut Self {
        self.deadline = Some(deadline);
        self
    }

    /// Validate, persist and publish the draft, then release the lock.
    pub fn commit(mut self) -> Result<()> {
        let draft = std::mem::take(&mut self.draft);
        self.finished = true;
        MutationEngine::commit(
            self.repo,
            &self.schema,
            &mut *self.object,
            draft,
            self.deadline.as_ref(),
        )
    }

    /// Delete the record and the index document, then release the lock.
    pub fn destroy(mut self) -> Result<()> {
        self.finished = true;
        MutationEngine::destroy(self.repo, &mut *self.object, self.deadline.as_ref())
    }
}

impl Drop for Unlocked<'_> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::debug!(id = %self.object.id, "unlock scope discarded");
        }
    }
}
