//! # Mutation Engine
//!
//! Commit and destroy pipelines for unlock scopes.
//!
//! Commit order:
//! 1. `before_validation` hooks, validation, `before_save` hooks, then
//!    validation again when any `before_save` hook ran
//! 2. Projection (required derived-index failures stop here)
//! 3. Record write, then index publish
//! 4. Snapshot swap
//!
//! The record write happens-before the index publish. If the publish fails
//! or the deadline passes in between, the previous record is put back (or
//! the new one deleted) before the error is returned, so storage and index
//! never disagree because of a failed commit.

use crate::deadline::{self, Deadline};
use crate::indexer::Indexer;
use crate::object::LockedObject;
use crate::registry::TypeSchema;
use crate::repository::Repository;
use crate::store::{RecordStore, StoredRecord};
use crate::types::{Attributes, LodestoreError, ObjectId, Result};
use crate::validation;
use chrono::Utc;

/// Stateless commit/destroy pipeline.
pub struct MutationEngine;

impl MutationEngine {
    /// Validate, persist and publish a draft, then swap the object's snapshot.
    pub fn commit(
        repo: &Repository,
        schema: &TypeSchema,
        object: &mut LockedObject,
        mut draft: Attributes,
        deadline: Option<&Deadline>,
    ) -> Result<()> {
        deadline::check(deadline)?;

        for hook in schema.descriptor().before_validation_hooks() {
            hook(&mut draft);
        }
        validation::validate(schema, &draft)?;
        let before_save = schema.descriptor().before_save_hooks();
        if !before_save.is_empty() {
            for hook in before_save {
                hook(&mut draft);
            }
            // Hook output is held to the same invariants as caller input.
            validation::validate(schema, &draft)?;
        }

        let now = Utc::now();
        let created_at = object.created_at().unwrap_or(now);
        let projection = Indexer::project(schema, object.id(), &draft, created_at, now)?;

        deadline::check(deadline)?;
        let store = repo.store();
        let previous = store.get(object.id())?;
        let record = StoredRecord::from_values(object.id().clone(), schema, &draft, created_at, now);
        store.put(&record)?;

        if let Err(e) = deadline::check(deadline) {
            restore(store, object.id(), previous);
            return Err(e);
        }
        if let Err(e) = repo.index().submit(&projection.document) {
            tracing::warn!(id = %object.id(), error = %e, "index publish failed, restoring record");
            restore(store, object.id(), previous);
            return Err(e);
        }

        tracing::debug!(
            id = %object.id(),
            model = %object.model(),
            warnings = projection.warnings.len(),
            "committed"
        );
        object.replace_snapshot(draft, created_at, now);
        Ok(())
    }

    /// Delete the record and the index document.
    ///
    /// Fails with `NotFound` if no record exists for the identity.
    pub fn destroy(
        repo: &Repository,
        object: &mut LockedObject,
        deadline: Option<&Deadline>,
    ) -> Result<()> {
        deadline::check(deadline)?;
        let store = repo.store();
        let previous = store
            .get(object.id())?
            .ok_or_else(|| LodestoreError::NotFound(object.id().clone()))?;
        store.delete(object.id())?;

        if let Err(e) = deadline::check(deadline) {
            restore(store, object.id(), Some(previous));
            return Err(e);
        }
        if let Err(e) = repo.index().delete(object.id()) {
            tracing::warn!(id = %object.id(), error = %e, "index delete failed, restoring record");
            restore(store, object.id(), Some(previous));
            return Err(e);
        }

        tracing::debug!(id = %object.id(), model = %object.model(), "destroyed");
        object.mark_destroyed();
        Ok(())
    }
}

/// Put the record store back to its state before a failed commit.
fn restore(store: &dyn RecordStore, id: &ObjectId, previous: Option<StoredRecord>) {
    let outcome = match previous {
        Some(record) => store.put(&record),
        None => store.delete(id).map(|_| ()),
    };
    if let Err(e) = outcome {
        tracing::error!(id = %id, error = %e, "record rollback failed");
    }
}

#[cfg(test)]
mod tests {
    use crate::registry::{AttributeDescriptor, TypeDescriptor};
    use crate::repository::Repository;
    use crate::types::{LodestoreError, ValueType};

    fn repo(descriptor: TypeDescriptor) -> Repository {
        let repo = Repository::in_memory();
        repo.registry().register_type(descriptor).expect("type");
        for attribute in [
            AttributeDescriptor::new("title", "dc:title", ValueType::String).required(),
            AttributeDescriptor::new("created", "dc:created", ValueType::Date),
        ] {
            repo.registry().register("Item", attribute).expect("attribute");
        }
        repo
    }

    #[test]
    fn before_save_output_is_validated() {
        let repo = repo(TypeDescriptor::new("Item").before_save(|values| {
            values.push("title", "Second title");
        }));
        let mut item = repo.new_object("Item").expect("new");
        let result = item.unlock_and_mutate(&repo, |o| {
            o.set("title", "Alpha");
            Ok(())
        });

        let Err(LodestoreError::Validation(errors)) = result else {
            unreachable!("expected validation failure");
        };
        assert_eq!(errors.on("title"), vec!["accepts one value, got 2"]);
        assert!(!repo.exists(item.id()).expect("exists"));
        assert_eq!(repo.document_count().expect("documents"), 0);
    }

    #[test]
    fn before_save_output_is_persisted() {
        let repo = repo(TypeDescriptor::new("Item").before_save(|values| {
            if !values.is_present("created") {
                values.set("created", "2020-01-01");
            }
        }));
        let item = repo
            .create("Item", |o| {
                o.set("title", "Alpha");
                Ok(())
            })
            .expect("create");
        let found = repo.find(item.id(), &["Item"]).expect("find");
        assert_eq!(found.get("created"), Some("2020-01-01"));
    }
}
