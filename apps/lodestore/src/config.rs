//! # Schema Configuration
//!
//! Types, attributes and derived indexes declared in TOML and turned into a
//! `Registry`.
//!
//! ```toml
//! [[types]]
//! name = "Item"
//! default_per_page = 10
//!
//! [[types.attributes]]
//! name = "title"
//! predicate = "http://purl.org/dc/terms/title"
//! value_type = "string"
//! roles = ["search", "sort"]
//! required = true
//!
//! [[types.derived]]
//! name = "doi_without_label"
//! kind = "strip_prefix"
//! attribute = "doi"
//! prefix = "doi:"
//! roles = ["exact_match"]
//! ```
//!
//! Hooks and custom validators cannot be expressed here; they are only
//! available to programs that build a `Registry` directly.

use lodestore_core::{
    AttributeDescriptor, Derivation, DerivedIndexDescriptor, IndexRole, LodestoreError, Registry,
    TypeDescriptor, ValueType,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Schema used when no file is given.
pub const DEFAULT_SCHEMA: &str = include_str!("../schema/default.toml");

/// Maximum schema file size (1 MB).
const MAX_SCHEMA_FILE_SIZE: u64 = 1024 * 1024;

// =============================================================================
// SCHEMA FILE LAYOUT
// =============================================================================

/// Root of a schema file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaConfig {
    #[serde(default)]
    pub types: Vec<TypeConfig>,
}

/// One `[[types]]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TypeConfig {
    pub name: String,
    pub default_per_page: Option<usize>,
    pub max_per_page: Option<usize>,
    #[serde(default)]
    pub attributes: Vec<AttributeConfig>,
    #[serde(default)]
    pub derived: Vec<DerivedConfig>,
}

/// One `[[types.attributes]]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttributeConfig {
    pub name: String,
    pub predicate: String,
    pub value_type: ValueType,
    #[serde(default)]
    pub multi: bool,
    #[serde(default)]
    pub roles: Vec<IndexRole>,
    #[serde(default)]
    pub required: bool,
}

/// One `[[types.derived]]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedConfig {
    pub name: String,
    #[serde(default)]
    pub multi: bool,
    #[serde(default)]
    pub roles: Vec<IndexRole>,
    #[serde(default)]
    pub required: bool,
    #[serde(flatten)]
    pub kind: DerivationConfig,
}

/// Built-in derivations, selected by `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DerivationConfig {
    Union {
        attributes: Vec<String>,
    },
    StripPrefix {
        attribute: String,
        prefix: String,
    },
    Year {
        attribute: String,
    },
    Join {
        attributes: Vec<String>,
        #[serde(default = "default_separator")]
        separator: String,
    },
}

fn default_separator() -> String {
    "_".to_string()
}

impl From<DerivationConfig> for Derivation {
    fn from(config: DerivationConfig) -> Self {
        match config {
            DerivationConfig::Union { attributes } => Derivation::Union(attributes),
            DerivationConfig::StripPrefix { attribute, prefix } => {
                Derivation::StripPrefix { attribute, prefix }
            }
            DerivationConfig::Year { attribute } => Derivation::Year { attribute },
            DerivationConfig::Join {
                attributes,
                separator,
            } => Derivation::Join {
                attributes,
                separator,
            },
        }
    }
}

// =============================================================================
// LOADING
// =============================================================================

impl SchemaConfig {
    /// Parse a schema from TOML text.
    pub fn parse(text: &str) -> Result<Self, LodestoreError> {
        toml::from_str(text)
            .map_err(|e| LodestoreError::InvalidConfig(format!("Invalid schema: {}", e)))
    }

    /// The embedded default schema.
    pub fn default_schema() -> Result<Self, LodestoreError> {
        Self::parse(DEFAULT_SCHEMA)
    }

    /// Read and parse a schema file.
    pub fn from_file(path: &Path) -> Result<Self, LodestoreError> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            LodestoreError::IoError(format!(
                "Cannot read schema '{}': {}",
                path.display(),
                e
            ))
        })?;
        if metadata.len() > MAX_SCHEMA_FILE_SIZE {
            return Err(LodestoreError::InvalidConfig(format!(
                "Schema size {} bytes exceeds maximum allowed {} bytes",
                metadata.len(),
                MAX_SCHEMA_FILE_SIZE
            )));
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| LodestoreError::IoError(format!("Read schema: {}", e)))?;
        Self::parse(&text)
    }

    /// Register every declared type, attribute and derived index.
    ///
    /// Attributes are registered before derived indexes so that derivations
    /// can name attributes declared later in the same type table.
    pub fn build_registry(&self) -> Result<Registry, LodestoreError> {
        let registry = Registry::new();
        for t in &self.types {
            let mut descriptor = TypeDescriptor::new(t.name.as_str());
            if let Some(n) = t.default_per_page {
                descriptor.default_per_page = n;
            }
            if let Some(n) = t.max_per_page {
                descriptor.max_per_page = n;
            }
            registry.register_type(descriptor)?;

            for a in &t.attributes {
                let mut attribute =
                    AttributeDescriptor::new(a.name.as_str(), a.predicate.as_str(), a.value_type)
                        .indexed_as(a.roles.iter().copied());
                if a.multi {
                    attribute = attribute.multi();
                }
                if a.required {
                    attribute = attribute.required();
                }
                registry.register(&t.name, attribute)?;
            }

            for d in &t.derived {
                let mut derived =
                    DerivedIndexDescriptor::new(d.name.as_str(), d.kind.clone().into())
                        .indexed_as(d.roles.iter().copied());
                if d.multi {
                    derived = derived.multi();
                }
                if d.required {
                    derived = derived.required();
                }
                registry.register_derived(&t.name, derived)?;
            }
        }
        tracing::debug!(types = self.types.len(), "schema loaded");
        Ok(registry)
    }
}

/// Build the registry from `path`, or from the embedded default schema.
pub fn load_registry(path: Option<&Path>) -> Result<Registry, LodestoreError> {
    let config = match path {
        Some(path) => SchemaConfig::from_file(path)?,
        None => SchemaConfig::default_schema()?,
    };
    config.build_registry()
}

// =============================================================================
// TESTS
// =============================================================================
