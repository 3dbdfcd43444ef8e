//! # Derived Index Computations
//!
//! A derived index is a named index entry whose values are computed from an
//! object's attribute snapshot instead of being stored. Computations are pure:
//! the same snapshot always yields the same values, so re-indexing is
//! repeatable.

use crate::dates;
use crate::registry::{AttributeDescriptor, TypeSchema};
use crate::types::{Attributes, ValueType, parse_json_array};
use std::fmt;
use std::sync::Arc;

/// Signature of a caller-supplied computation.
///
/// An empty vector means "no value"; an `Err` is a failed computation.
pub type ComputeFn = Arc<dyn Fn(&Attributes) -> Result<Vec<String>, String> + Send + Sync>;

/// How a derived index obtains its values.
#[derive(Clone)]
pub enum Derivation {
    /// Every element of every listed attribute, in declaration order.
    Union(Vec<String>),
    /// Values of `attribute` with `prefix` removed.
    StripPrefix { attribute: String, prefix: String },
    /// Four-digit year of the first value of `attribute`.
    Year { attribute: String },
    /// First values of `attributes` joined by `separator`; empty if any is missing.
    Join {
        attributes: Vec<String>,
        separator: String,
    },
    /// Arbitrary pure computation.
    Custom(ComputeFn),
}

impl fmt::Debug for Derivation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Union(attrs) => f.debug_tuple("Union").field(attrs).finish(),
            Self::StripPrefix { attribute, prefix } => f
                .debug_struct("StripPrefix")
                .field("attribute", attribute)
                .field("prefix", prefix)
                .finish(),
            Self::Year { attribute } => f.debug_struct("Year").field("attribute", attribute).finish(),
            Self::Join {
                attributes,
                separator,
            } => f
                .debug_struct("Join")
                .field("attributes", attributes)
                .field("separator", separator)
                .finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl Derivation {
    /// Wrap a closure as a derivation.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&Attributes) -> Result<Vec<String>, String> + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(f))
    }

    /// Attributes the derivation reads. Custom closures declare none.
    #[must_use]
    pub fn inputs(&self) -> Vec<&str> {
        match self {
            Self::Union(attrs) | Self::Join {
                attributes: attrs, ..
            } => attrs.iter().map(String::as_str).collect(),
            Self::StripPrefix { attribute, .. } | Self::Year { attribute } => {
                vec![attribute.as_str()]
            }
            Self::Custom(_) => Vec::new(),
        }
    }

    /// Compute the derived values for a snapshot.
    pub fn evaluate(&self, schema: &TypeSchema, values: &Attributes) -> Result<Vec<String>, String> {
        match self {
            Self::Union(attrs) => {
                let mut out = Vec::new();
                for name in attrs {
                    out.extend(input_elements(schema, name, values)?);
                }
                Ok(out)
            }
            Self::StripPrefix { attribute, prefix } => Ok(input_elements(schema, attribute, values)?
                .into_iter()
                .map(|v| v.strip_prefix(prefix.as_str()).map(str::to_string).unwrap_or(v))
                .filter(|v| !v.is_empty())
                .collect()),
            Self::Year { attribute } => match values.get(attribute) {
                None => Ok(Vec::new()),
                Some(raw) => dates::year_of(raw)
                    .map(|year| vec![year])
                    .ok_or_else(|| format!("no year in {:?}", raw)),
            },
            Self::Join {
                attributes,
                separator,
            } => {
                let mut parts = Vec::with_capacity(attributes.len());
                for name in attributes {
                    match values.get(name) {
                        Some(v) if !v.trim().is_empty() => parts.push(v),
                        _ => return Ok(Vec::new()),
                    }
                }
                Ok(vec![parts.join(separator.as_str())])
            }
            Self::Custom(f) => f(values),
        }
    }
}

fn input_elements(schema: &TypeSchema, name: &str, values: &Attributes) -> Result<Vec<String>, String> {
    match schema.attribute(name) {
        Some(descriptor) => element_values(descriptor, values),
        None => Ok(values.get_all(name).to_vec()),
    }
}

/// Logical elements of an attribute: `json_array` values are expanded,
/// everything else is returned as stored.
pub(crate) fn element_values(
    descriptor: &AttributeDescriptor,
    values: &Attributes,
) -> Result<Vec<String>, String> {
    let raw = values.get_all(&descriptor.name);
    if descriptor.value_type != ValueType::JsonArray {
        return Ok(raw.to_vec());
    }
    let mut out = Vec::new();
    for value in raw {
        out.extend(parse_json_array(value)?);
    }
    Ok(out)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Registry, TypeDescriptor};

    fn schema() -> Arc<TypeSchema> {
        let registry = Registry::new();
        registry
            .register_type(TypeDescriptor::new("Item"))
            .expect("type");
        registry
            .register(
                "Item",
                AttributeDescriptor::new("creators", "bibo:authorList", ValueType::JsonArray),
            )
            .expect("creators");
        registry
            .register(
                "Item",
                AttributeDescriptor::new("contributors", "dc11:contributor", ValueType::String)
                    .multi(),
            )
            .expect("contributors");
        registry.schema("Item").expect("schema")
    }

    #[test]
    fn union_expands_json_arrays() {
        let mut values = Attributes::new();
        values.set("creators", r#"["Doe, Jane","Roe, Rick"]"#);
        values.push("contributors", "Poe, Pat");

        let derived = Derivation::Union(vec!["creators".into(), "contributors".into()])
            .evaluate(&schema(), &values)
            .expect("union");
        assert_eq!(derived, vec!["Doe, Jane", "Roe, Rick", "Poe, Pat"]);
    }

    #[test]
    fn union_reports_malformed_json() {
        let mut values = Attributes::new();
        values.set("creators", "[oops");
        let result =
            Derivation::Union(vec!["creators".into()]).evaluate(&schema(), &values);
        assert!(result.is_err());
    }

    #[test]
    fn strip_prefix_and_year() {
        let mut values = Attributes::new();
        values.set("doi", "doi:10.7939/R3");
        values.set("created", "circa 1950");

        let doi = Derivation::StripPrefix {
            attribute: "doi".into(),
            prefix: "doi:".into(),
        }
        .evaluate(&schema(), &values)
        .expect("strip");
        assert_eq!(doi, vec!["10.7939/R3"]);

        let year = Derivation::Year {
            attribute: "created".into(),
        }
        .evaluate(&schema(), &values)
        .expect("year");
        assert_eq!(year, vec!["1950"]);
    }

    #[test]
    fn join_requires_every_part() {
        let mut values = Attributes::new();
        values.set("item_type", "article");
        let join = Derivation::Join {
            attributes: vec!["item_type".into(), "status".into()],
            separator: "_".into(),
        };
        assert!(join.evaluate(&schema(), &values).expect("join").is_empty());

        values.set("status", "published");
        assert_eq!(
            join.evaluate(&schema(), &values).expect("join"),
            vec!["article_published"]
        );
    }

    #[test]
    fn custom_closure_runs() {
        let d = Derivation::custom(|v| Ok(v.get_all("tags").iter().map(|t| t.to_uppercase()).collect()));
        let mut values = Attributes::new();
        values.push("tags", "a");
        assert_eq!(d.evaluate(&schema(), &values).expect("custom"), vec!["A"]);
        assert!(d.inputs().is_empty());
    }
}
