//! # Reifier
//!
//! Turns index rows back into locked domain objects without touching the
//! record store. Values come from the stored `{name}_ssm` fields, the type
//! from the `has_model_ssim` discriminator.

use crate::dates;
use crate::index::IndexDocument;
use crate::object::{LockedObject, ObjectState};
use crate::primitives::{CREATED_FIELD, MODIFIED_FIELD};
use crate::registry::{Registry, stored_field};
use crate::types::{Attributes, LodestoreError, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Stateless row-to-object conversion.
pub struct Reifier;

impl Reifier {
    /// Materialize one index row as a locked object.
    pub fn reify(registry: &Registry, row: &IndexDocument) -> Result<LockedObject> {
        let model = row
            .model()
            .ok_or_else(|| LodestoreError::UnrecognizedType(String::new()))?;
        let schema = registry
            .schema(model)
            .map_err(|_| LodestoreError::UnrecognizedType(model.to_string()))?;

        let mut values = Attributes::new();
        for attr in schema.attributes() {
            values.set_all(attr.name.clone(), row.values(&stored_field(&attr.name)).iter().cloned());
        }

        let updated_at = timestamp(row, MODIFIED_FIELD);
        let created_at = timestamp(row, CREATED_FIELD).or(updated_at);

        Ok(LockedObject::from_parts(
            row.id.clone(),
            schema.name().clone(),
            Arc::new(values),
            created_at,
            updated_at,
            ObjectState::Indexed,
        ))
    }
}

fn timestamp(row: &IndexDocument, field: &str) -> Option<DateTime<Utc>> {
    row.first(field).and_then(dates::parse_date)
}
