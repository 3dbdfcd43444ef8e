//! # redb-backed Record Store
//!
//! Records are kept in the `records` table, keyed by object id, with values
//! in the persistence format. Every write is its own ACID transaction.
//!
//! The database handle is shared: the redb search index lives in the same
//! file, because redb allows one open handle per file and process.

use super::{RecordStore, StoredRecord};
use crate::formats::{decode_record, encode_record};
use crate::types::{LodestoreError, ObjectId, Result};
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::path::Path;
use std::sync::Arc;

/// Table for records: object id -> encoded `StoredRecord`.
const RECORDS: TableDefinition<&str, &[u8]> = TableDefinition::new("records");

fn backend(e: impl std::fmt::Display) -> LodestoreError {
    LodestoreError::BackendUnavailable(e.to_string())
}

/// Open or create a redb database file.
pub fn open_database(path: impl AsRef<Path>) -> Result<Arc<Database>> {
    let db = Database::create(path.as_ref()).map_err(backend)?;
    Ok(Arc::new(db))
}

/// A disk-backed record store.
pub struct RedbRecordStore {
    db: Arc<Database>,
}

impl std::fmt::Debug for RedbRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbRecordStore").finish_non_exhaustive()
    }
}

impl RedbRecordStore {
    /// Use a shared database handle, creating the `records` table if needed.
    pub fn new(db: Arc<Database>) -> Result<Self> {
        let write_txn = db.begin_write().map_err(backend)?;
        {
            let _ = write_txn.open_table(RECORDS).map_err(backend)?;
        }
        write_txn.commit().map_err(backend)?;
        Ok(Self { db })
    }

    /// Open or create a database file holding only a record store.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(open_database(path)?)
    }
}

impl RecordStore for RedbRecordStore {
    fn get(&self, id: &ObjectId) -> Result<Option<StoredRecord>> {
        let read_txn = self.db.begin_read().map_err(backend)?;
        let table = read_txn.open_table(RECORDS).map_err(backend)?;
        table
            .get(id.as_str())
            .map_err(backend)?
            .map(|bytes| decode_record(bytes.value()))
            .transpose()
    }

    fn put(&self, record: &StoredRecord) -> Result<()> {
        let bytes = encode_record(record)?;
        let write_txn = self.db.begin_write().map_err(backend)?;
        {
            let mut table = write_txn.open_table(RECORDS).map_err(backend)?;
            table
                .insert(record.id.as_str(), bytes.as_slice())
                .map_err(backend)?;
        }
        write_txn.commit().map_err(backend)?;
        Ok(())
    }

    fn delete(&self, id: &ObjectId) -> Result<bool> {
        let write_txn = self.db.begin_write().map_err(backend)?;
        let existed = {
            let mut table = write_txn.open_table(RECORDS).map_err(backend)?;
            let removed = table.remove(id.as_str()).map_err(backend)?;
            removed.is_some()
        };
        write_txn.commit().map_err(backend)?;
        Ok(existed)
    }

    fn ids(&self) -> Result<Vec<ObjectId>> {
        let read_txn = self.db.begin_read().map_err(backend)?;
        let table = read_txn.open_table(RECORDS).map_err(backend)?;
        let mut ids = Vec::new();
        for entry in table.iter().map_err(backend)? {
            let (key, _) = entry.map_err(backend)?;
            ids.push(ObjectId::new(key.value()));
        }
        Ok(ids)
    }

    fn len(&self) -> Result<usize> {
        let read_txn = self.db.begin_read().map_err(backend)?;
        let table = read_txn.open_table(RECORDS).map_err(backend)?;
        Ok(table.len().map_err(backend)? as usize)
    }
}
