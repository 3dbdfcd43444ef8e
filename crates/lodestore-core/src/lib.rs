//! # lodestore-core
//!
//! The locked object store - THE LOGIC.
//!
//! Domain objects are persisted as predicate → values records and projected,
//! through a declarative attribute registry, into one search-index document
//! per identity. A deferred query builder reads the index back into locked
//! objects.
//!
//! ## Data Flow
//!
//! ```text
//! register types → unlock / commit → record store + index document
//!                                   → deferred query → reifier → LockedObject
//! ```
//!
//! ## Architectural Constraints
//!
//! - Objects are read-only outside an explicit unlock scope
//! - One unlock scope per identity at a time (fail-fast)
//! - Record writes happen-before index publishes; failed publishes roll back
//! - Query builders never execute; terminal operations always re-execute
//! - Has NO async, NO network dependencies (pure Rust)

// =============================================================================
// MODULES
// =============================================================================

pub mod dates;
pub mod deadline;
pub mod derived;
pub mod formats;
pub mod index;
pub mod indexer;
pub mod locks;
pub mod mutation;
pub mod object;
pub mod primitives;
pub mod query;
pub mod registry;
pub mod reifier;
pub mod repository;
pub mod store;
pub mod types;
pub mod validation;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    Attributes, Cardinality, FieldError, IndexRole, LodestoreError, ObjectId, Result, TypeName,
    ValidationErrors, ValueType, parse_json_array,
};

// =============================================================================
// RE-EXPORTS: Registry
// =============================================================================

pub use derived::Derivation;
pub use registry::{
    AttributeDescriptor, DerivedIndexDescriptor, Registry, TypeDescriptor, TypeSchema,
    role_field, stored_field,
};

// =============================================================================
// RE-EXPORTS: Objects, Queries, Repository
// =============================================================================

pub use deadline::Deadline;
pub use indexer::{IndexWarning, Indexer, Projection};
pub use mutation::MutationEngine;
pub use object::{LockedObject, ObjectState, Unlocked};
pub use query::{DeferredQuery, Results};
pub use reifier::Reifier;
pub use repository::{Backend, ReindexReport, Repository};

// =============================================================================
// RE-EXPORTS: Backends
// =============================================================================

pub use index::{
    Criteria, Direction, FacetCount, FieldKind, IndexDocument, IndexField, MemorySearchIndex,
    QueryResult, RedbSearchIndex, SearchIndex, SortSpec,
};
pub use store::{MemoryRecordStore, RecordStore, RedbRecordStore, StoredRecord};

// =============================================================================
// RE-EXPORTS: Formats
// =============================================================================

pub use formats::{PersistenceHeader, decode_document, decode_record, encode_document, encode_record};
