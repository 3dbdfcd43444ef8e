//! # Indexer
//!
//! Projects an object's attribute snapshot into its index document.
//!
//! The projection is deterministic: the same schema and the same values
//! always yield the same document, so re-indexing is idempotent.
//!
//! ## Failure Policy
//!
//! A value that cannot be projected (malformed `json_array`, unparsable sort
//! date, failed derived computation) omits its field and is reported as an
//! `IndexWarning`. A failing derived index declared `required` aborts the
//! projection with `DerivedIndex` instead.

use crate::dates;
use crate::derived::element_values;
use crate::index::{FieldKind, IndexDocument, tokenize};
use crate::primitives::{CREATED_FIELD, MODEL_FIELD, MODIFIED_FIELD, PATH_DELIMITER};
use crate::registry::{TypeSchema, role_field, stored_field};
use crate::types::{Attributes, Cardinality, IndexRole, LodestoreError, ObjectId, Result, ValueType};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

/// A field that was left out of a projection, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexWarning {
    pub field: String,
    pub reason: String,
}

/// Output of `Indexer::project`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    pub document: IndexDocument,
    pub warnings: Vec<IndexWarning>,
}

/// Stateless projection engine.
pub struct Indexer;

impl Indexer {
    /// Build the index document for one object snapshot.
    pub fn project(
        schema: &TypeSchema,
        id: &ObjectId,
        values: &Attributes,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<Projection> {
        let mut document = IndexDocument::new(id.clone());
        let mut warnings = Vec::new();

        document.add(MODEL_FIELD, FieldKind::Keyword, schema.name().as_str());
        document.add(CREATED_FIELD, FieldKind::Keyword, dates::format_timestamp(&created_at));
        document.add(MODIFIED_FIELD, FieldKind::Keyword, dates::format_timestamp(&updated_at));

        for attr in schema.attributes() {
            let raw = values.get_all(&attr.name);
            if raw.is_empty() {
                continue;
            }
            document.add_all(stored_field(&attr.name), FieldKind::Stored, raw.iter().cloned());

            let elements = match element_values(attr, values) {
                Ok(elements) => elements,
                Err(reason) => {
                    warn(id, &mut warnings, &attr.name, reason);
                    continue;
                }
            };
            for &role in &attr.index_roles {
                let field = role_field(&attr.name, attr.value_type, role);
                if let Err(reason) = project_role(&mut document, &field, attr.value_type, role, &elements) {
                    warn(id, &mut warnings, &field, reason);
                }
            }
        }

        for derived in schema.derived() {
            let computed = derived
                .derivation
                .evaluate(schema, values)
                .and_then(|out| match derived.cardinality {
                    Cardinality::Single if out.len() > 1 => Err(format!(
                        "produced {} values for a single-valued index",
                        out.len()
                    )),
                    _ => Ok(out),
                });
            let elements = match computed {
                Ok(elements) => elements,
                Err(reason) if derived.required => {
                    tracing::warn!(id = %id, index = %derived.name, %reason, "required derived index failed");
                    return Err(LodestoreError::DerivedIndex {
                        index: derived.name.clone(),
                        reason,
                    });
                }
                Err(reason) => {
                    warn(id, &mut warnings, &derived.name, reason);
                    continue;
                }
            };
            for &role in &derived.index_roles {
                let field = role_field(&derived.name, ValueType::String, role);
                if let Err(reason) = project_role(&mut document, &field, ValueType::String, role, &elements) {
                    warn(id, &mut warnings, &field, reason);
                }
            }
        }

        Ok(Projection { document, warnings })
    }
}

fn warn(id: &ObjectId, warnings: &mut Vec<IndexWarning>, field: &str, reason: String) {
    tracing::warn!(id = %id, field, %reason, "index field omitted");
    warnings.push(IndexWarning {
        field: field.to_string(),
        reason,
    });
}

fn project_role(
    document: &mut IndexDocument,
    field: &str,
    value_type: ValueType,
    role: IndexRole,
    elements: &[String],
) -> std::result::Result<(), String> {
    let elements = elements.iter().filter(|v| !v.trim().is_empty());
    match role {
        IndexRole::Search if value_type == ValueType::Text => {
            document.add_all(field, FieldKind::Text, elements.flat_map(|v| tokenize(v)));
        }
        IndexRole::Search => document.add_all(field, FieldKind::Token, elements.cloned()),
        IndexRole::Facet | IndexRole::ExactMatch => {
            document.add_all(field, FieldKind::Keyword, elements.cloned());
        }
        IndexRole::Sort => {
            let Some(first) = elements.into_iter().next() else {
                return Ok(());
            };
            let key = if value_type == ValueType::Date {
                dates::sort_key(first).ok_or_else(|| format!("{:?} is not a sortable date", first))?
            } else {
                first.clone()
            };
            document.add(field, FieldKind::Keyword, key);
        }
        IndexRole::Pathing => {
            let mut seen = BTreeSet::new();
            for path in elements {
                for prefix in ancestors(path) {
                    if seen.insert(prefix.clone()) {
                        document.add(field, FieldKind::Keyword, prefix);
                    }
                }
            }
        }
    }
    Ok(())
}

/// `a/b/c` → `a`, `a/b`, `a/b/c`.
fn ancestors(path: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    for segment in path.split(PATH_DELIMITER).filter(|s| !s.is_empty()) {
        if !current.is_empty() {
            current.push(PATH_DELIMITER);
        }
        current.push_str(segment);
        out.push(current.clone());
    }
    out
}

// =============================================================================
// TESTS
// =============================================================================
