//! # Core Type Definitions
//!
//! This module contains the shared vocabulary of the lodestore core:
//! - Identifiers (`ObjectId`, `TypeName`)
//! - Attribute metadata enums (`ValueType`, `Cardinality`, `IndexRole`)
//! - The attribute value mirror (`Attributes`)
//! - Error types (`LodestoreError`, `ValidationErrors`)
//!
//! ## Ordering Guarantees
//!
//! Every type that ends up in a map or set implements `Ord` so that records,
//! index documents and query results iterate in a deterministic order.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Stable, opaque identity of a persisted object.
///
/// Assigned once when the object is constructed and never reassigned.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId(pub String);

impl ObjectId {
    /// Generate a fresh random identity.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Wrap an existing identifier.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Name of a registered domain type (e.g. `Item`, `Thesis`).
///
/// Doubles as the type discriminator written into every index document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TypeName(pub String);

impl TypeName {
    /// Create a new type name.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the type name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// =============================================================================
// ATTRIBUTE METADATA
// =============================================================================

/// Value type of a declared attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    /// Short string, indexed as exact tokens.
    String,
    /// Free text, tokenized for search.
    Text,
    /// Date or timestamp (ISO 8601 / RFC 3339, or a bare year).
    Date,
    /// Absolute URI.
    Uri,
    /// Ordered list of strings stored as JSON text.
    JsonArray,
    /// Hierarchical path of parent identifiers joined by `/`.
    Path,
}

impl ValueType {
    /// Lowercase name as used in configuration files.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Text => "text",
            Self::Date => "date",
            Self::Uri => "uri",
            Self::JsonArray => "json_array",
            Self::Path => "path",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether an attribute holds one value or many.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    #[default]
    Single,
    Multi,
}

/// Index role an attribute (or derived index) participates in.
///
/// Each role produces its own, differently shaped index field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexRole {
    /// Full-text search (tokenized for `text`, exact tokens otherwise).
    Search,
    /// Untokenized facet buckets, one per value.
    Facet,
    /// Single sortable key.
    Sort,
    /// Untokenized key used by equality filters.
    ExactMatch,
    /// Hierarchical ancestor keys.
    Pathing,
}

impl IndexRole {
    /// Lowercase name as used in configuration files.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Facet => "facet",
            Self::Sort => "sort",
            Self::ExactMatch => "exact_match",
            Self::Pathing => "pathing",
        }
    }
}

impl fmt::Display for IndexRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// ATTRIBUTE VALUES
// =============================================================================

/// In-memory mirror of an object's attribute values, keyed by attribute name.
///
/// Single-valued attributes hold at most one entry. An attribute with no
/// values is absent from the map.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Attributes(BTreeMap<String, Vec<String>>);

impl Attributes {
    /// Create an empty value set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// First value of an attribute.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// All values of an attribute (empty slice if absent).
    #[must_use]
    pub fn get_all(&self, name: &str) -> &[String] {
        self.0.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Replace an attribute with a single value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), vec![value.into()]);
    }

    /// Replace an attribute with a list of values. An empty list clears it.
    pub fn set_all<I, V>(&mut self, name: impl Into<String>, values: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        let name = name.into();
        if values.is_empty() {
            self.0.remove(&name);
        } else {
            self.0.insert(name, values);
        }
    }

    /// Append a value to an attribute.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.entry(name.into()).or_default().push(value.into());
    }

    /// Remove an attribute, returning its previous values.
    pub fn remove(&mut self, name: &str) -> Option<Vec<String>> {
        self.0.remove(name)
    }

    /// True if the attribute has at least one non-blank value.
    #[must_use]
    pub fn is_present(&self, name: &str) -> bool {
        self.get_all(name).iter().any(|v| !v.trim().is_empty())
    }

    /// Iterate attributes in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Number of attributes holding values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if no attribute holds a value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Parse a `json_array` value into its elements.
///
/// Non-string elements are rendered with their JSON text.
pub fn parse_json_array(raw: &str) -> std::result::Result<Vec<String>, String> {
    let parsed: serde_json::Value = serde_json::from_str(raw).map_err(|e| e.to_string())?;
    match parsed {
        serde_json::Value::Array(items) => Ok(items
            .into_iter()
            .map(|item| match item {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            })
            .collect()),
        _ => Err("expected a JSON array".to_string()),
    }
}

// =============================================================================
// VALIDATION ERRORS
// =============================================================================

/// A single failed invariant on an attribute (or on the whole object when
/// `attribute` is `base`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub attribute: String,
    pub message: String,
}

/// Every invariant that failed during one commit attempt.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure on an attribute.
    pub fn add(&mut self, attribute: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError {
            attribute: attribute.into(),
            message: message.into(),
        });
    }

    /// Messages recorded against one attribute.
    #[must_use]
    pub fn on(&self, attribute: &str) -> Vec<&str> {
        self.errors
            .iter()
            .filter(|e| e.attribute == attribute)
            .map(|e| e.message.as_str())
            .collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.errors.iter()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{} {}", e.attribute, e.message)?;
        }
        Ok(())
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the lodestore core.
///
/// - Configuration errors are fatal and surface at registration time
/// - Validation, lookup and concurrency errors are recoverable per call
/// - Every record store / index failure becomes `BackendUnavailable`
#[derive(Debug, Error)]
pub enum LodestoreError {
    /// The type was already declared.
    #[error("Type already registered: {0}")]
    DuplicateType(TypeName),

    /// The type has not been declared.
    #[error("Unknown type: {0}")]
    UnknownType(TypeName),

    /// The (type, attribute) key is already registered.
    #[error("Attribute already registered: {type_name}.{attribute}")]
    DuplicateAttribute {
        type_name: TypeName,
        attribute: String,
    },

    /// The attribute is not declared on the type.
    #[error("Unknown attribute: {type_name}.{attribute}")]
    UnknownAttribute {
        type_name: TypeName,
        attribute: String,
    },

    /// The descriptor combines settings that cannot be indexed.
    #[error("Invalid descriptor {type_name}.{attribute}: {reason}")]
    InvalidDescriptor {
        type_name: TypeName,
        attribute: String,
        reason: String,
    },

    /// Declared invariants failed at commit.
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    /// No record exists for the identity.
    #[error("Object not found: {0}")]
    NotFound(ObjectId),

    /// The record exists but is stored under another type.
    #[error("Type mismatch for {id}: stored as {found}, expected one of {expected:?}")]
    TypeMismatch {
        id: ObjectId,
        found: TypeName,
        expected: Vec<TypeName>,
    },

    /// The attribute does not carry the role a query needs.
    #[error("Attribute {type_name}.{attribute} has no {role} index")]
    NonIndexableAttribute {
        type_name: TypeName,
        attribute: String,
        role: IndexRole,
    },

    /// Another unlock scope holds this identity.
    #[error("Concurrent modification of {0}")]
    ConcurrentModification(ObjectId),

    /// A derived index declared as required could not be computed.
    #[error("Required derived index {index} failed: {reason}")]
    DerivedIndex { index: String, reason: String },

    /// An index row names a type that is not registered.
    #[error("Unrecognized type discriminator: {0:?}")]
    UnrecognizedType(String),

    /// The record store or search index failed.
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// A record or document could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Reading or writing a local file or stream failed.
    #[error("I/O error: {0}")]
    IoError(String),

    /// A schema file or option value could not be used.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A deadline expired or the operation was cancelled.
    #[error("Operation cancelled")]
    Cancelled,

    /// The caller's unlock block failed; nothing was committed.
    #[error("Aborted: {0}")]
    Aborted(String),
}

impl LodestoreError {
    /// Registration-time mistakes that should stop the process.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::DuplicateType(_)
                | Self::UnknownType(_)
                | Self::DuplicateAttribute { .. }
                | Self::UnknownAttribute { .. }
                | Self::InvalidDescriptor { .. }
                | Self::NonIndexableAttribute { .. }
                | Self::InvalidConfig(_)
        )
    }

    /// "Your input was invalid."
    #[must_use]
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::DerivedIndex { .. })
    }

    /// "The record does not exist."
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::TypeMismatch { .. })
    }

    /// "The system is unavailable."
    #[must_use]
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            Self::BackendUnavailable(_) | Self::SerializationError(_) | Self::Cancelled
        )
    }

    /// Failures a caller may simply retry.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConcurrentModification(_) | Self::BackendUnavailable(_) | Self::Cancelled
        )
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, LodestoreError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attributes_set_and_get() {
        let mut attrs = Attributes::new();
        attrs.set("title", "Alpha");
        attrs.push("languages", "en");
        attrs.push("languages", "fr");

        assert_eq!(attrs.get("title"), Some("Alpha"));
        assert_eq!(attrs.get_all("languages"), ["en", "fr"]);
        assert!(attrs.get_all("missing").is_empty());
    }

    #[test]
    fn set_all_empty_clears_attribute() {
        let mut attrs = Attributes::new();
        attrs.set("title", "Alpha");
        attrs.set_all("title", Vec::<String>::new());

        assert!(attrs.get("title").is_none());
        assert!(attrs.is_empty());
    }

    #[test]
    fn blank_values_are_not_present() {
        let mut attrs = Attributes::new();
        attrs.set("title", "   ");
        assert!(!attrs.is_present("title"));
    }

    #[test]
    fn json_array_parses_strings_and_scalars() {
        let parsed = parse_json_array(r#"["Doe, Jane", 7]"#).expect("parse");
        assert_eq!(parsed, vec!["Doe, Jane".to_string(), "7".to_string()]);
        assert!(parse_json_array(r#"{"a":1}"#).is_err());
        assert!(parse_json_array("not json").is_err());
    }

    #[test]
    fn validation_errors_display() {
        let mut errors = ValidationErrors::new();
        errors.add("title", "is required");
        errors.add("base", "needs either license or rights");

        assert_eq!(errors.on("title"), vec!["is required"]);
        assert_eq!(
            errors.to_string(),
            "title is required; base needs either license or rights"
        );
    }

    #[test]
    fn error_classification() {
        let missing = LodestoreError::NotFound(ObjectId::new("x"));
        assert!(missing.is_not_found());
        assert!(!missing.is_infrastructure());

        let down = LodestoreError::BackendUnavailable("disk".into());
        assert!(down.is_infrastructure());
        assert!(down.is_retryable());

        let dup = LodestoreError::DuplicateType(TypeName::new("Item"));
        assert!(dup.is_configuration());

        let bad_schema = LodestoreError::InvalidConfig("Unknown backend: sqlite".into());
        assert!(bad_schema.is_configuration());
        assert!(!bad_schema.is_infrastructure());

        let io = LodestoreError::IoError("broken pipe".into());
        assert!(!io.is_infrastructure());
        assert!(!io.is_retryable());
    }
}
