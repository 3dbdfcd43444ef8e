//! In-memory record store (volatile).

use super::{RecordStore, StoredRecord};
use crate::types::{ObjectId, Result};
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Volatile record store for tests and the `memory` backend.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: RwLock<BTreeMap<ObjectId, StoredRecord>>,
}

impl MemoryRecordStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryRecordStore {
    fn get(&self, id: &ObjectId) -> Result<Option<StoredRecord>> {
        Ok(self.records.read().get(id).cloned())
    }

    fn put(&self, record: &StoredRecord) -> Result<()> {
        self.records
            .write()
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    fn delete(&self, id: &ObjectId) -> Result<bool> {
        Ok(self.records.write().remove(id).is_some())
    }

    fn ids(&self) -> Result<Vec<ObjectId>> {
        Ok(self.records.read().keys().cloned().collect())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.records.read().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeName;
    use chrono::Utc;

    fn record(id: &str) -> StoredRecord {
        let now = Utc::now();
        StoredRecord {
            id: ObjectId::new(id),
            model: TypeName::new("Item"),
            triples: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn put_get_delete() {
        let store = MemoryRecordStore::new();
        store.put(&record("b")).expect("put");
        store.put(&record("a")).expect("put");

        assert!(store.get(&ObjectId::new("a")).expect("get").is_some());
        assert_eq!(
            store.ids().expect("ids"),
            vec![ObjectId::new("a"), ObjectId::new("b")]
        );
        assert!(store.delete(&ObjectId::new("a")).expect("delete"));
        assert!(!store.delete(&ObjectId::new("a")).expect("delete"));
        assert_eq!(store.len().expect("len"), 1);
    }
}
