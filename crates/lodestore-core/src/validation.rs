//! # Commit Validation
//!
//! Declarative invariants checked on a draft before anything is persisted:
//! required presence, cardinality, value-type conformance and size limits,
//! followed by the type's custom validators. Every failure is collected so a
//! caller can report them all at once.

use crate::dates;
use crate::primitives::{MAX_VALUES_PER_ATTRIBUTE, MAX_VALUE_LENGTH, PATH_DELIMITER};
use crate::registry::{AttributeDescriptor, TypeSchema};
use crate::types::{Attributes, LodestoreError, Result, ValidationErrors, ValueType, parse_json_array};

/// Validate a draft against a type schema.
///
/// Returns `LodestoreError::Validation` carrying every failed invariant.
pub fn validate(schema: &TypeSchema, values: &Attributes) -> Result<()> {
    let mut errors = ValidationErrors::new();

    for (name, _) in values.iter() {
        if schema.attribute(name).is_none() {
            errors.add(name, "is not a declared attribute");
        }
    }

    for descriptor in schema.attributes() {
        check_attribute(descriptor, values, &mut errors);
    }

    for validator in schema.descriptor().validators() {
        validator(values, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(LodestoreError::Validation(errors))
    }
}

fn check_attribute(descriptor: &AttributeDescriptor, values: &Attributes, errors: &mut ValidationErrors) {
    let name = descriptor.name.as_str();
    let raw = values.get_all(name);

    if descriptor.required && !values.is_present(name) {
        errors.add(name, "is required");
    }
    if !descriptor.is_multi() && raw.len() > 1 {
        errors.add(name, format!("accepts one value, got {}", raw.len()));
    }
    if raw.len() > MAX_VALUES_PER_ATTRIBUTE {
        errors.add(
            name,
            format!("has too many values (maximum {})", MAX_VALUES_PER_ATTRIBUTE),
        );
    }

    for value in raw {
        if value.len() > MAX_VALUE_LENGTH {
            errors.add(
                name,
                format!("value is too long (maximum {} bytes)", MAX_VALUE_LENGTH),
            );
            continue;
        }
        if value.trim().is_empty() {
            continue;
        }
        if let Some(message) = type_error(descriptor.value_type, value) {
            errors.add(name, message);
        }
    }
}

fn type_error(value_type: ValueType, value: &str) -> Option<String> {
    match value_type {
        ValueType::String | ValueType::Text => None,
        ValueType::Date => dates::parse_date(value)
            .is_none()
            .then(|| format!("{:?} is not a valid date", value)),
        ValueType::Uri => url::Url::parse(value)
            .err()
            .map(|e| format!("{:?} is not a valid URI ({})", value, e)),
        ValueType::JsonArray => parse_json_array(value)
            .err()
            .map(|e| format!("is not a JSON array ({})", e)),
        ValueType::Path => value
            .split(PATH_DELIMITER)
            .any(str::is_empty)
            .then(|| format!("{:?} is not a valid path", value)),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::primitives::BASE_ERROR_KEY;
    use crate::registry::{Registry, TypeDescriptor};
    use std::sync::Arc;

    fn schema() -> Arc<TypeSchema> {
        let registry = Registry::new();
        registry
            .register_type(TypeDescriptor::new("Item").validate_with(|values, errors| {
                if !values.is_present("license") && !values.is_present("rights") {
                    errors.add(BASE_ERROR_KEY, "needs either license or rights");
                }
            }))
            .expect("type");
        for descriptor in [
            AttributeDescriptor::new("title", "dc:title", ValueType::String).required(),
            AttributeDescriptor::new("created", "dc:created", ValueType::Date),
            AttributeDescriptor::new("license", "dc:license", ValueType::Uri),
            AttributeDescriptor::new("rights", "dc11:rights", ValueType::String),
            AttributeDescriptor::new("creators", "bibo:authorList", ValueType::JsonArray),
            AttributeDescriptor::new("member_of", "pcdm:memberOf", ValueType::Path).multi(),
        ] {
            registry.register("Item", descriptor).expect("attribute");
        }
        registry.schema("Item").expect("schema")
    }

    fn valid() -> Attributes {
        let mut values = Attributes::new();
        values.set("title", "Alpha");
        values.set("rights", "All rights reserved");
        values
    }

    #[test]
    fn valid_draft_passes() {
        let mut values = valid();
        values.set("created", "2017-05");
        values.set("license", "http://creativecommons.org/licenses/by/4.0/");
        values.set("creators", r#"["Doe, Jane"]"#);
        values.push("member_of", "community/collection");
        assert!(validate(&schema(), &values).is_ok());
    }

    #[test]
    fn collects_every_failure() {
        let mut values = Attributes::new();
        values.set("created", "someday");
        values.set("license", "not a uri");
        values.set("creators", "[broken");
        values.push("member_of", "a//b");

        let Err(LodestoreError::Validation(errors)) = validate(&schema(), &values) else {
            panic!("expected validation failure");
        };
        assert_eq!(errors.on("title"), vec!["is required"]);
        assert_eq!(errors.on("created").len(), 1);
        assert_eq!(errors.on("license").len(), 1);
        assert_eq!(errors.on("creators").len(), 1);
        assert_eq!(errors.on("member_of").len(), 1);
        // license is present, only malformed
        assert!(errors.on(BASE_ERROR_KEY).is_empty());
    }

    #[test]
    fn custom_validator_reports_on_base() {
        let mut values = Attributes::new();
        values.set("title", "Alpha");

        let Err(LodestoreError::Validation(errors)) = validate(&schema(), &values) else {
            panic!("expected validation failure");
        };
        assert_eq!(errors.on(BASE_ERROR_KEY), vec!["needs either license or rights"]);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn single_valued_attribute_rejects_lists() {
        let mut values = valid();
        values.push("title", "Beta");
        let Err(LodestoreError::Validation(errors)) = validate(&schema(), &values) else {
            panic!("expected validation failure");
        };
        assert_eq!(errors.on("title"), vec!["accepts one value, got 2"]);
    }

    #[test]
    fn undeclared_attribute_rejected() {
        let mut values = valid();
        values.set("colour", "blue");
        assert!(validate(&schema(), &values).is_err());
    }

    #[test]
    fn oversized_value_rejected() {
        let mut values = valid();
        values.set("rights", "x".repeat(MAX_VALUE_LENGTH + 1));
        assert!(validate(&schema(), &values).is_err());
    }
}
