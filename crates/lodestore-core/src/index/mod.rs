//! # Search Index
//!
//! The search collaborator: one document per identity, each a map of named
//! fields. Submitting a document replaces whatever was indexed under its id.
//!
//! ## Field Kinds
//!
//! - `Stored`: returned with the row, never matched
//! - `Text`: pre-tokenized terms for full-text matching
//! - `Token`: exact values, matched term-wise by full-text queries
//! - `Keyword`: exact values for filters, facets and sorting
//!
//! Query evaluation lives in `eval` and is shared by both backends, so they
//! return identical results for identical documents.

mod eval;
mod memory;
mod redb_index;

pub use eval::tokenize;
pub use memory::MemorySearchIndex;
pub use redb_index::RedbSearchIndex;

use crate::primitives::MODEL_FIELD;
use crate::types::{ObjectId, Result, TypeName};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// DOCUMENTS
// =============================================================================

/// How a field participates in queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    Stored,
    Text,
    Token,
    Keyword,
}

/// Values of one document field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexField {
    pub kind: FieldKind,
    pub values: Vec<String>,
}

/// A flat, per-identity index entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDocument {
    pub id: ObjectId,
    pub fields: BTreeMap<String, IndexField>,
}

impl IndexDocument {
    #[must_use]
    pub fn new(id: ObjectId) -> Self {
        Self {
            id,
            fields: BTreeMap::new(),
        }
    }

    /// Append a value to a field, creating it with `kind` if absent.
    pub fn add(&mut self, field: impl Into<String>, kind: FieldKind, value: impl Into<String>) {
        self.fields
            .entry(field.into())
            .or_insert_with(|| IndexField {
                kind,
                values: Vec::new(),
            })
            .values
            .push(value.into());
    }

    /// Append several values. Nothing is created for an empty list.
    pub fn add_all<I, V>(&mut self, field: impl Into<String>, kind: FieldKind, values: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        let field = field.into();
        for value in values {
            self.add(field.clone(), kind, value);
        }
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&IndexField> {
        self.fields.get(name)
    }

    /// Values of a field (empty slice if absent).
    #[must_use]
    pub fn values(&self, name: &str) -> &[String] {
        self.fields
            .get(name)
            .map(|f| f.values.as_slice())
            .unwrap_or(&[])
    }

    #[must_use]
    pub fn first(&self, name: &str) -> Option<&str> {
        self.values(name).first().map(String::as_str)
    }

    /// The type discriminator, if present.
    #[must_use]
    pub fn model(&self) -> Option<&str> {
        self.first(MODEL_FIELD)
    }
}

// =============================================================================
// CRITERIA & RESULTS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// Sort field and direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub field: String,
    pub direction: Direction,
}

/// A fully resolved index query.
///
/// All filters must hold (AND); all full-text terms must match some
/// `Text` or `Token` field.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Criteria {
    /// Accepted type discriminators; empty accepts any type.
    pub models: Vec<TypeName>,
    /// (field, value) equality filters.
    pub filters: Vec<(String, String)>,
    /// Lowercased full-text terms.
    pub terms: Vec<String>,
    pub sort: Option<SortSpec>,
    pub start: usize,
    pub rows: usize,
    pub facet_fields: Vec<String>,
}

/// One facet bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetCount {
    pub value: String,
    pub count: usize,
}

/// Output of an index query.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueryResult {
    /// Number of matching documents, independent of `start`/`rows`.
    pub total: usize,
    /// The requested slice, in sort order.
    pub rows: Vec<IndexDocument>,
    /// Buckets per requested facet field, by count desc then value.
    pub facets: BTreeMap<String, Vec<FacetCount>>,
}

// =============================================================================
// SEARCHINDEX TRAIT
// =============================================================================

/// Document index with replace-by-identity semantics.
pub trait SearchIndex: Send + Sync + std::fmt::Debug {
    /// Insert or replace the document for `document.id`.
    fn submit(&self, document: &IndexDocument) -> Result<()>;

    /// Remove a document. Returns whether it existed.
    fn delete(&self, id: &ObjectId) -> Result<bool>;

    /// Fetch the document for an identity.
    fn get(&self, id: &ObjectId) -> Result<Option<IndexDocument>>;

    fn query(&self, criteria: &Criteria) -> Result<QueryResult>;

    /// Every indexed identity in ascending order.
    fn ids(&self) -> Result<Vec<ObjectId>>;

    /// Number of indexed documents.
    fn len(&self) -> Result<usize>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Remove every document.
    fn clear(&self) -> Result<()>;
}
