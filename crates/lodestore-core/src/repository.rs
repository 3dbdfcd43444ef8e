//! # Repository
//!
//! Entry point binding a registry to a record store and a search index.
//!
//! ## Storage Backends
//!
//! - `Backend::Memory`: volatile `MemoryRecordStore` + `MemorySearchIndex`
//! - `Backend::Redb(path)`: one redb file holding both the `records` and the
//!   `documents` tables
//!
//! A repository is `Send + Sync`; share it behind an `Arc` between threads.
//!
//! Unlock exclusivity is enforced by the repository's `LockTable`. Two
//! repositories over the same store only exclude each other when they share
//! one table (`Repository::with_locks`).

use crate::indexer::{IndexWarning, Indexer, Projection};
use crate::index::{MemorySearchIndex, RedbSearchIndex, SearchIndex};
use crate::locks::LockTable;
use crate::object::{LockedObject, ObjectState, Unlocked};
use crate::query::DeferredQuery;
use crate::registry::Registry;
use crate::store::{MemoryRecordStore, RecordStore, RedbRecordStore, open_database};
use crate::types::{LodestoreError, ObjectId, Result, TypeName};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Which collaborators a repository opens.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Backend {
    /// In-memory store and index (fast, volatile).
    #[default]
    Memory,
    /// Disk-backed store and index in one redb file (ACID, persistent).
    Redb(PathBuf),
}

/// Outcome of `Repository::reindex_all`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReindexReport {
    /// Records republished to the index.
    pub indexed: usize,
    /// Soft projection failures, per identity.
    pub warnings: Vec<(ObjectId, IndexWarning)>,
    /// Records that could not be republished.
    pub failed: Vec<(ObjectId, String)>,
}

/// A registry plus the record store and search index it projects into.
#[derive(Debug)]
pub struct Repository {
    registry: Arc<Registry>,
    store: Arc<dyn RecordStore>,
    index: Arc<dyn SearchIndex>,
    locks: LockTable,
}

impl Repository {
    /// Build a repository from explicit collaborators.
    pub fn new(
        registry: Arc<Registry>,
        store: Arc<dyn RecordStore>,
        index: Arc<dyn SearchIndex>,
    ) -> Self {
        Self {
            registry,
            store,
            index,
            locks: LockTable::new(),
        }
    }

    /// Use `locks` for unlock exclusivity instead of a private table.
    #[must_use]
    pub fn with_locks(mut self, locks: LockTable) -> Self {
        self.locks = locks;
        self
    }

    /// Handle to this repository's lock table, for sharing with another
    /// repository over the same store.
    #[must_use]
    pub fn lock_table(&self) -> LockTable {
        self.locks.clone()
    }

    /// Volatile repository with its own empty registry.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::with_registry(Arc::new(Registry::new()))
    }

    /// Volatile repository sharing an existing registry.
    #[must_use]
    pub fn with_registry(registry: Arc<Registry>) -> Self {
        Self::new(
            registry,
            Arc::new(MemoryRecordStore::new()),
            Arc::new(MemorySearchIndex::new()),
        )
    }

    /// Persistent repository backed by one redb file.
    pub fn with_redb(registry: Arc<Registry>, path: impl AsRef<Path>) -> Result<Self> {
        let db = open_database(path)?;
        let store = RedbRecordStore::new(Arc::clone(&db))?;
        let index = RedbSearchIndex::new(db)?;
        Ok(Self::new(registry, Arc::new(store), Arc::new(index)))
    }

    /// Open the collaborators named by `backend`.
    pub fn open(registry: Arc<Registry>, backend: &Backend) -> Result<Self> {
        match backend {
            Backend::Memory => Ok(Self::with_registry(registry)),
            Backend::Redb(path) => Self::with_redb(registry, path),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The shared registry handle.
    #[must_use]
    pub fn registry_handle(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    pub(crate) fn store(&self) -> &dyn RecordStore {
        self.store.as_ref()
    }

    pub(crate) fn index(&self) -> &dyn SearchIndex {
        self.index.as_ref()
    }

    pub(crate) fn locks(&self) -> &LockTable {
        &self.locks
    }

    // =========================================================================
    // OBJECT LIFECYCLE
    // =========================================================================

    /// Load an object from the record store.
    ///
    /// `types` restricts the accepted stored types; an empty slice accepts
    /// any. Fails with `NotFound` if no record exists and `TypeMismatch` if
    /// the record's type is not among `types`.
    pub fn find(&self, id: &ObjectId, types: &[&str]) -> Result<LockedObject> {
        let record = self
            .store
            .get(id)?
            .ok_or_else(|| LodestoreError::NotFound(id.clone()))?;
        if !types.is_empty() && !types.contains(&record.model.as_str()) {
            return Err(LodestoreError::TypeMismatch {
                id: id.clone(),
                found: record.model,
                expected: types.iter().map(|t| TypeName::new(*t)).collect(),
            });
        }
        let schema = self.registry.schema(record.model.as_str())?;
        let values = record.values(&schema);
        Ok(LockedObject::from_parts(
            record.id,
            record.model,
            Arc::new(values),
            Some(record.created_at),
            Some(record.updated_at),
            ObjectState::Stored,
        ))
    }

    /// True if a record exists for the identity.
    pub fn exists(&self, id: &ObjectId) -> Result<bool> {
        Ok(self.store.get(id)?.is_some())
    }

    /// An unsaved object of a registered type, with a fresh identity.
    pub fn new_object(&self, type_name: &str) -> Result<LockedObject> {
        let schema = self.registry.schema(type_name)?;
        Ok(LockedObject::new(schema.name().clone()))
    }

    /// Construct an object, fill it in `block` and commit it.
    pub fn create<F>(&self, type_name: &str, block: F) -> Result<LockedObject>
    where
        F: FnOnce(&mut Unlocked<'_>) -> Result<()>,
    {
        let mut object = self.new_object(type_name)?;
        object.unlock_and_mutate(self, block)?;
        Ok(object)
    }

    /// Start a deferred query over one type.
    pub fn query(&self, type_name: &str) -> Result<DeferredQuery<'_>> {
        DeferredQuery::for_type(self, type_name)
    }

    // =========================================================================
    // MAINTENANCE
    // =========================================================================

    /// Republish one object's stored record to the index.
    pub fn reindex(&self, object: &LockedObject) -> Result<Vec<IndexWarning>> {
        self.reindex_id(object.id())
    }

    fn reindex_id(&self, id: &ObjectId) -> Result<Vec<IndexWarning>> {
        let projection = self.project_id(id)?;
        self.index.submit(&projection.document)?;
        Ok(projection.warnings)
    }

    fn project_id(&self, id: &ObjectId) -> Result<Projection> {
        let record = self
            .store
            .get(id)?
            .ok_or_else(|| LodestoreError::NotFound(id.clone()))?;
        let schema = self.registry.schema(record.model.as_str())?;
        let values = record.values(&schema);
        Indexer::project(&schema, id, &values, record.created_at, record.updated_at)
    }

    /// Rebuild the index from the record store.
    ///
    /// Every record is projected before the index is touched. A record that
    /// cannot be loaded or projected (undecodable, unregistered type, failed
    /// required derived index) is reported in `failed`; only an unavailable
    /// backend or a cancellation aborts, and then the index is unchanged.
    /// Afterwards, rows with no successfully projected record are deleted.
    pub fn reindex_all(&self) -> Result<ReindexReport> {
        let mut report = ReindexReport::default();
        let mut documents = Vec::new();
        for id in self.store.ids()? {
            match self.project_id(&id) {
                Ok(projection) => {
                    report
                        .warnings
                        .extend(projection.warnings.into_iter().map(|w| (id.clone(), w)));
                    documents.push(projection.document);
                }
                Err(e @ (LodestoreError::BackendUnavailable(_) | LodestoreError::Cancelled)) => {
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(id = %id, error = %e, "record skipped during reindex");
                    report.failed.push((id, e.to_string()));
                }
            }
        }

        let mut published = BTreeSet::new();
        for document in documents {
            self.index.submit(&document)?;
            published.insert(document.id);
            report.indexed += 1;
        }
        let mut removed = 0usize;
        for id in self.index.ids()? {
            if !published.contains(&id) && self.index.delete(&id)? {
                removed += 1;
            }
        }

        tracing::info!(
            indexed = report.indexed,
            failed = report.failed.len(),
            removed,
            "reindex complete"
        );
        Ok(report)
    }

    /// Number of stored records.
    pub fn record_count(&self) -> Result<usize> {
        self.store.len()
    }

    /// Number of indexed documents.
    pub fn document_count(&self) -> Result<usize> {
        self.index.len()
    }
}

// =============================================================================
// TESTS
// =============================================================================
