//! # Record Store
//!
//! The triple-store collaborator: one record per identity, holding the
//! object's type and its predicate → values map. Writes are atomic per
//! identity; nothing here knows about index roles.
//!
//! ## Backends
//!
//! - `MemoryRecordStore`: `BTreeMap` behind a `parking_lot::RwLock`
//! - `RedbRecordStore`: redb table `records`, one ACID transaction per write

mod memory;
mod redb_store;

pub use memory::MemoryRecordStore;
pub use redb_store::{RedbRecordStore, open_database};

use crate::registry::TypeSchema;
use crate::types::{Attributes, ObjectId, Result, TypeName};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// STORED RECORD
// =============================================================================

/// A persisted object as the record store sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: ObjectId,
    pub model: TypeName,
    /// Predicate → values.
    pub triples: BTreeMap<String, Vec<String>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredRecord {
    /// Translate attribute values into predicate triples.
    #[must_use]
    pub fn from_values(
        id: ObjectId,
        schema: &TypeSchema,
        values: &Attributes,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        let triples = schema
            .attributes()
            .iter()
            .filter_map(|attr| {
                let raw = values.get_all(&attr.name);
                (!raw.is_empty()).then(|| (attr.predicate.clone(), raw.to_vec()))
            })
            .collect();
        Self {
            id,
            model: schema.name().clone(),
            triples,
            created_at,
            updated_at,
        }
    }

    /// Translate predicate triples back into attribute values.
    ///
    /// Predicates no longer declared on the type are skipped.
    #[must_use]
    pub fn values(&self, schema: &TypeSchema) -> Attributes {
        let mut values = Attributes::new();
        for (predicate, raw) in &self.triples {
            if let Some(attr) = schema.attribute_for_predicate(predicate) {
                values.set_all(attr.name.clone(), raw.iter().cloned());
            }
        }
        values
    }
}

// =============================================================================
// RECORDSTORE TRAIT
// =============================================================================

/// Persistent key → record storage.
///
/// Implementations use interior locking so a store can be shared between
/// threads behind an `Arc`.
pub trait RecordStore: Send + Sync + std::fmt::Debug {
    /// Fetch the record for an identity.
    fn get(&self, id: &ObjectId) -> Result<Option<StoredRecord>>;

    /// Insert or replace the record for `record.id`.
    fn put(&self, record: &StoredRecord) -> Result<()>;

    /// Remove a record. Returns whether it existed.
    fn delete(&self, id: &ObjectId) -> Result<bool>;

    /// Every stored identity in ascending order.
    fn ids(&self) -> Result<Vec<ObjectId>>;

    /// Number of stored records.
    fn len(&self) -> Result<usize> {
        Ok(self.ids()?.len())
    }

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{AttributeDescriptor, Registry, TypeDescriptor};
    use crate::types::ValueType;

    #[test]
    fn values_map_through_predicates() {
        let registry = Registry::new();
        registry
            .register_type(TypeDescriptor::new("Item"))
            .expect("type");
        registry
            .register(
                "Item",
                AttributeDescriptor::new("title", "dc:title", ValueType::String),
            )
            .expect("title");
        let schema = registry.schema("Item").expect("schema");

        let mut values = Attributes::new();
        values.set("title", "Alpha");
        let now = Utc::now();
        let record = StoredRecord::from_values(ObjectId::new("a"), &schema, &values, now, now);

        assert_eq!(record.triples.get("dc:title"), Some(&vec!["Alpha".to_string()]));
        assert_eq!(record.values(&schema), values);
    }
}
