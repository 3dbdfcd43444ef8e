//! # redb-backed Search Index
//!
//! Documents are kept in the `documents` table keyed by object id. Queries
//! read a consistent snapshot (one read transaction), decode every document
//! and evaluate criteria in memory.

use super::{Criteria, IndexDocument, QueryResult, SearchIndex, eval};
use crate::formats::{decode_document, encode_document};
use crate::store::open_database;
use crate::types::{LodestoreError, ObjectId, Result};
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::path::Path;
use std::sync::Arc;

/// Table for documents: object id -> encoded `IndexDocument`.
const DOCUMENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("documents");

fn backend(e: impl std::fmt::Display) -> LodestoreError {
    LodestoreError::BackendUnavailable(e.to_string())
}

/// A disk-backed search index.
pub struct RedbSearchIndex {
    db: Arc<Database>,
}

impl std::fmt::Debug for RedbSearchIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbSearchIndex").finish_non_exhaustive()
    }
}

impl RedbSearchIndex {
    /// Use a shared database handle, creating the `documents` table if needed.
    pub fn new(db: Arc<Database>) -> Result<Self> {
        let write_txn = db.begin_write().map_err(backend)?;
        {
            let _ = write_txn.open_table(DOCUMENTS).map_err(backend)?;
        }
        write_txn.commit().map_err(backend)?;
        Ok(Self { db })
    }

    /// Open or create a database file holding only a search index.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(open_database(path)?)
    }

    fn load_all(&self) -> Result<Vec<IndexDocument>> {
        let read_txn = self.db.begin_read().map_err(backend)?;
        let table = read_txn.open_table(DOCUMENTS).map_err(backend)?;
        let mut documents = Vec::new();
        for entry in table.iter().map_err(backend)? {
            let (_, value) = entry.map_err(backend)?;
            documents.push(decode_document(value.value())?);
        }
        Ok(documents)
    }
}

impl SearchIndex for RedbSearchIndex {
    fn submit(&self, document: &IndexDocument) -> Result<()> {
        let bytes = encode_document(document)?;
        let write_txn = self.db.begin_write().map_err(backend)?;
        {
            let mut table = write_txn.open_table(DOCUMENTS).map_err(backend)?;
            table
                .insert(document.id.as_str(), bytes.as_slice())
                .map_err(backend)?;
        }
        write_txn.commit().map_err(backend)?;
        Ok(())
    }

    fn delete(&self, id: &ObjectId) -> Result<bool> {
        let write_txn = self.db.begin_write().map_err(backend)?;
        let existed = {
            let mut table = write_txn.open_table(DOCUMENTS).map_err(backend)?;
            let removed = table.remove(id.as_str()).map_err(backend)?;
            removed.is_some()
        };
        write_txn.commit().map_err(backend)?;
        Ok(existed)
    }

    fn get(&self, id: &ObjectId) -> Result<Option<IndexDocument>> {
        let read_txn = self.db.begin_read().map_err(backend)?;
        let table = read_txn.open_table(DOCUMENTS).map_err(backend)?;
        table
            .get(id.as_str())
            .map_err(backend)?
            .map(|bytes| decode_document(bytes.value()))
            .transpose()
    }

    fn query(&self, criteria: &Criteria) -> Result<QueryResult> {
        Ok(eval::execute(self.load_all()?, criteria))
    }

    fn ids(&self) -> Result<Vec<ObjectId>> {
        let read_txn = self.db.begin_read().map_err(backend)?;
        let table = read_txn.open_table(DOCUMENTS).map_err(backend)?;
        let mut ids = Vec::new();
        for entry in table.iter().map_err(backend)? {
            let (key, _) = entry.map_err(backend)?;
            ids.push(ObjectId::new(key.value()));
        }
        Ok(ids)
    }

    fn len(&self) -> Result<usize> {
        let read_txn = self.db.begin_read().map_err(backend)?;
        let table = read_txn.open_table(DOCUMENTS).map_err(backend)?;
        Ok(table.len().map_err(backend)? as usize)
    }

    fn clear(&self) -> Result<()> {
        let write_txn = self.db.begin_write().map_err(backend)?;
        write_txn.delete_table(DOCUMENTS).map_err(backend)?;
        {
            let _ = write_txn.open_table(DOCUMENTS).map_err(backend)?;
        }
        write_txn.commit().map_err(backend)?;
        Ok(())
    }
}
