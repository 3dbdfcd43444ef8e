//! # Attribute Registry
//!
//! Per-type declarative metadata: which attributes exist, which predicate
//! stores them, their value type and cardinality, and which index roles they
//! serve. Derived indexes, validators, lifecycle hooks and pagination limits
//! are declared here as well.
//!
//! ## Registration Rules
//!
//! - Append-only: nothing is ever replaced or removed
//! - Keyed by (type, name); attributes and derived indexes share a namespace
//! - Each type's schema is swapped copy-on-write, so readers always see a
//!   complete snapshot (`Arc<TypeSchema>`)
//!
//! ## Field Naming
//!
//! `role_field` is a pure function of (name, value type, role). The indexer
//! and the query builder both call it, which is what keeps them in agreement.

use crate::derived::Derivation;
use crate::primitives::{DEFAULT_PER_PAGE, MAX_NAME_LENGTH, MAX_PER_PAGE, STORED_SUFFIX};
use crate::types::{
    Attributes, Cardinality, IndexRole, LodestoreError, Result, TypeName, ValidationErrors,
    ValueType,
};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// Lifecycle hook run against the draft values of an unlock scope.
pub type Hook = Arc<dyn Fn(&mut Attributes) + Send + Sync>;

/// Type-level validator; records failures into the error list.
pub type Validator = Arc<dyn Fn(&Attributes, &mut ValidationErrors) + Send + Sync>;

// =============================================================================
// FIELD NAMING
// =============================================================================

/// Index field name for one role of an attribute.
#[must_use]
pub fn role_field(name: &str, value_type: ValueType, role: IndexRole) -> String {
    let suffix = match (role, value_type) {
        (IndexRole::Search, ValueType::Text) => "tesim",
        (IndexRole::Search, _) => "tsim",
        (IndexRole::Facet, _) => "sim",
        (IndexRole::Sort, ValueType::Date) => "dtsi",
        (IndexRole::Sort, _) => "ssi",
        (IndexRole::ExactMatch, _) => "ssim",
        (IndexRole::Pathing, _) => "dpsim",
    };
    format!("{}_{}", name, suffix)
}

/// Stored-only field holding an attribute's raw values.
#[must_use]
pub fn stored_field(name: &str) -> String {
    format!("{}_{}", name, STORED_SUFFIX)
}

// =============================================================================
// DESCRIPTORS
// =============================================================================

/// One logical attribute of a type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDescriptor {
    pub name: String,
    /// Storage key in the record store's namespace.
    pub predicate: String,
    pub value_type: ValueType,
    pub cardinality: Cardinality,
    pub index_roles: BTreeSet<IndexRole>,
    /// Presence is validated at commit.
    pub required: bool,
}

impl AttributeDescriptor {
    /// Single-valued, unindexed, optional attribute.
    #[must_use]
    pub fn new(name: impl Into<String>, predicate: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            predicate: predicate.into(),
            value_type,
            cardinality: Cardinality::Single,
            index_roles: BTreeSet::new(),
            required: false,
        }
    }

    /// Make the attribute multi-valued.
    #[must_use]
    pub fn multi(mut self) -> Self {
        self.cardinality = Cardinality::Multi;
        self
    }

    /// Add index roles.
    #[must_use]
    pub fn indexed_as(mut self, roles: impl IntoIterator<Item = IndexRole>) -> Self {
        self.index_roles.extend(roles);
        self
    }

    /// Require a value at commit.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn is_multi(&self) -> bool {
        self.cardinality == Cardinality::Multi
    }

    #[must_use]
    pub fn has_role(&self, role: IndexRole) -> bool {
        self.index_roles.contains(&role)
    }
}

/// A computed index entry with no predicate of its own.
#[derive(Debug, Clone)]
pub struct DerivedIndexDescriptor {
    pub name: String,
    pub index_roles: BTreeSet<IndexRole>,
    pub cardinality: Cardinality,
    /// A failed computation aborts the commit instead of omitting the field.
    pub required: bool,
    pub derivation: Derivation,
}

impl DerivedIndexDescriptor {
    #[must_use]
    pub fn new(name: impl Into<String>, derivation: Derivation) -> Self {
        Self {
            name: name.into(),
            index_roles: BTreeSet::new(),
            cardinality: Cardinality::Single,
            required: false,
            derivation,
        }
    }

    #[must_use]
    pub fn indexed_as(mut self, roles: impl IntoIterator<Item = IndexRole>) -> Self {
        self.index_roles.extend(roles);
        self
    }

    #[must_use]
    pub fn multi(mut self) -> Self {
        self.cardinality = Cardinality::Multi;
        self
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn has_role(&self, role: IndexRole) -> bool {
        self.index_roles.contains(&role)
    }
}

/// Type-level declarations: pagination limits, validators and hooks.
#[derive(Clone)]
pub struct TypeDescriptor {
    pub name: TypeName,
    pub default_per_page: usize,
    pub max_per_page: usize,
    validators: Vec<Validator>,
    before_validation: Vec<Hook>,
    before_save: Vec<Hook>,
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("name", &self.name)
            .field("default_per_page", &self.default_per_page)
            .field("max_per_page", &self.max_per_page)
            .field("validators", &self.validators.len())
            .field("before_validation", &self.before_validation.len())
            .field("before_save", &self.before_save.len())
            .finish()
    }
}

impl TypeDescriptor {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: TypeName::new(name),
            default_per_page: DEFAULT_PER_PAGE,
            max_per_page: MAX_PER_PAGE,
            validators: Vec::new(),
            before_validation: Vec::new(),
            before_save: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_page_sizes(mut self, default_per_page: usize, max_per_page: usize) -> Self {
        self.default_per_page = default_per_page;
        self.max_per_page = max_per_page;
        self
    }

    /// Add a type-level validator run after the declarative checks.
    #[must_use]
    pub fn validate_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&Attributes, &mut ValidationErrors) + Send + Sync + 'static,
    {
        self.validators.push(Arc::new(f));
        self
    }

    /// Add a hook run on the draft before validation.
    #[must_use]
    pub fn before_validation<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Attributes) + Send + Sync + 'static,
    {
        self.before_validation.push(Arc::new(f));
        self
    }

    /// Add a hook run on the draft after validation, before persisting.
    #[must_use]
    pub fn before_save<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Attributes) + Send + Sync + 'static,
    {
        self.before_save.push(Arc::new(f));
        self
    }

    #[must_use]
    pub fn validators(&self) -> &[Validator] {
        &self.validators
    }

    #[must_use]
    pub fn before_validation_hooks(&self) -> &[Hook] {
        &self.before_validation
    }

    #[must_use]
    pub fn before_save_hooks(&self) -> &[Hook] {
        &self.before_save
    }
}

// =============================================================================
// TYPE SCHEMA (immutable snapshot)
// =============================================================================

/// Everything registered for one type, as of one point in time.
#[derive(Debug, Clone)]
pub struct TypeSchema {
    descriptor: TypeDescriptor,
    attributes: Vec<Arc<AttributeDescriptor>>,
    derived: Vec<Arc<DerivedIndexDescriptor>>,
}

impl TypeSchema {
    #[must_use]
    pub fn name(&self) -> &TypeName {
        &self.descriptor.name
    }

    #[must_use]
    pub fn descriptor(&self) -> &TypeDescriptor {
        &self.descriptor
    }

    /// Attributes in registration order.
    #[must_use]
    pub fn attributes(&self) -> &[Arc<AttributeDescriptor>] {
        &self.attributes
    }

    /// Derived indexes in registration order.
    #[must_use]
    pub fn derived(&self) -> &[Arc<DerivedIndexDescriptor>] {
        &self.derived
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Arc<AttributeDescriptor>> {
        self.attributes.iter().find(|a| a.name == name)
    }

    #[must_use]
    pub fn derived_index(&self, name: &str) -> Option<&Arc<DerivedIndexDescriptor>> {
        self.derived.iter().find(|d| d.name == name)
    }

    #[must_use]
    pub fn attribute_for_predicate(&self, predicate: &str) -> Option<&Arc<AttributeDescriptor>> {
        self.attributes.iter().find(|a| a.predicate == predicate)
    }

    fn contains_name(&self, name: &str) -> bool {
        self.attribute(name).is_some() || self.derived_index(name).is_some()
    }

    /// Index field for a role of an attribute or derived index.
    pub fn index_field_for(&self, name: &str, role: IndexRole) -> Result<String> {
        if let Some(attr) = self.attribute(name) {
            if !attr.has_role(role) {
                return Err(self.non_indexable(name, role));
            }
            return Ok(role_field(name, attr.value_type, role));
        }
        if let Some(derived) = self.derived_index(name) {
            if !derived.has_role(role) {
                return Err(self.non_indexable(name, role));
            }
            return Ok(role_field(name, ValueType::String, role));
        }
        Err(LodestoreError::UnknownAttribute {
            type_name: self.name().clone(),
            attribute: name.to_string(),
        })
    }

    fn non_indexable(&self, name: &str, role: IndexRole) -> LodestoreError {
        LodestoreError::NonIndexableAttribute {
            type_name: self.name().clone(),
            attribute: name.to_string(),
            role,
        }
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Process-wide, append-only registry of type schemas.
///
/// Share it behind an `Arc` between every repository handle.
#[derive(Debug, Default)]
pub struct Registry {
    types: RwLock<BTreeMap<TypeName, Arc<TypeSchema>>>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a type. Attributes are registered separately.
    pub fn register_type(&self, descriptor: TypeDescriptor) -> Result<()> {
        validate_name(&descriptor.name, descriptor.name.as_str())?;
        if descriptor.default_per_page == 0 || descriptor.default_per_page > descriptor.max_per_page
        {
            return Err(LodestoreError::InvalidDescriptor {
                type_name: descriptor.name.clone(),
                attribute: "per_page".to_string(),
                reason: format!(
                    "default page size {} must be between 1 and the maximum {}",
                    descriptor.default_per_page, descriptor.max_per_page
                ),
            });
        }

        let mut types = self.types.write();
        if types.contains_key(&descriptor.name) {
            return Err(LodestoreError::DuplicateType(descriptor.name));
        }
        tracing::debug!(type_name = %descriptor.name, "registered type");
        types.insert(
            descriptor.name.clone(),
            Arc::new(TypeSchema {
                descriptor,
                attributes: Vec::new(),
                derived: Vec::new(),
            }),
        );
        Ok(())
    }

    /// Register an attribute on a declared type.
    pub fn register(&self, type_name: &str, descriptor: AttributeDescriptor) -> Result<()> {
        let type_name = TypeName::new(type_name);
        validate_name(&type_name, &descriptor.name)?;

        let invalid = |reason: &str| LodestoreError::InvalidDescriptor {
            type_name: type_name.clone(),
            attribute: descriptor.name.clone(),
            reason: reason.to_string(),
        };
        if descriptor.predicate.trim().is_empty() {
            return Err(invalid("predicate must not be empty"));
        }
        if descriptor.has_role(IndexRole::Sort)
            && (descriptor.is_multi() || descriptor.value_type == ValueType::JsonArray)
        {
            return Err(invalid("a sort field must resolve to exactly one value"));
        }
        if descriptor.has_role(IndexRole::Pathing) && descriptor.value_type != ValueType::Path {
            return Err(invalid("pathing requires the path value type"));
        }

        let mut types = self.types.write();
        let current = types
            .get(&type_name)
            .ok_or_else(|| LodestoreError::UnknownType(type_name.clone()))?;
        if current.contains_name(&descriptor.name) {
            return Err(LodestoreError::DuplicateAttribute {
                type_name: type_name.clone(),
                attribute: descriptor.name,
            });
        }
        if current.attribute_for_predicate(&descriptor.predicate).is_some() {
            return Err(invalid("predicate already mapped to another attribute"));
        }

        let mut next = TypeSchema::clone(current);
        tracing::debug!(
            type_name = %type_name,
            attribute = %descriptor.name,
            roles = ?descriptor.index_roles,
            "registered attribute"
        );
        next.attributes.push(Arc::new(descriptor));
        types.insert(type_name, Arc::new(next));
        Ok(())
    }

    /// Register a derived index on a declared type.
    ///
    /// Built-in derivations may only read attributes that are already registered.
    pub fn register_derived(&self, type_name: &str, descriptor: DerivedIndexDescriptor) -> Result<()> {
        let type_name = TypeName::new(type_name);
        validate_name(&type_name, &descriptor.name)?;
        if descriptor.has_role(IndexRole::Sort) && descriptor.cardinality == Cardinality::Multi {
            return Err(LodestoreError::InvalidDescriptor {
                type_name,
                attribute: descriptor.name,
                reason: "a sort field must resolve to exactly one value".to_string(),
            });
        }

        let mut types = self.types.write();
        let current = types
            .get(&type_name)
            .ok_or_else(|| LodestoreError::UnknownType(type_name.clone()))?;
        if current.contains_name(&descriptor.name) {
            return Err(LodestoreError::DuplicateAttribute {
                type_name: type_name.clone(),
                attribute: descriptor.name,
            });
        }
        if let Some(missing) = descriptor
            .derivation
            .inputs()
            .into_iter()
            .find(|input| current.attribute(input).is_none())
        {
            return Err(LodestoreError::UnknownAttribute {
                type_name: type_name.clone(),
                attribute: missing.to_string(),
            });
        }

        let mut next = TypeSchema::clone(current);
        tracing::debug!(type_name = %type_name, index = %descriptor.name, "registered derived index");
        next.derived.push(Arc::new(descriptor));
        types.insert(type_name, Arc::new(next));
        Ok(())
    }

    /// Look up an attribute descriptor.
    pub fn describe(&self, type_name: &str, name: &str) -> Result<Arc<AttributeDescriptor>> {
        let schema = self.schema(type_name)?;
        schema
            .attribute(name)
            .cloned()
            .ok_or_else(|| LodestoreError::UnknownAttribute {
                type_name: schema.name().clone(),
                attribute: name.to_string(),
            })
    }

    /// Index field name for a role of an attribute or derived index.
    pub fn index_field_for(&self, type_name: &str, name: &str, role: IndexRole) -> Result<String> {
        self.schema(type_name)?.index_field_for(name, role)
    }

    /// Derived index descriptors of a type, in registration order.
    pub fn derived_indexes(&self, type_name: &str) -> Result<Vec<Arc<DerivedIndexDescriptor>>> {
        Ok(self.schema(type_name)?.derived().to_vec())
    }

    /// Current schema snapshot of a type.
    pub fn schema(&self, type_name: &str) -> Result<Arc<TypeSchema>> {
        self.types
            .read()
            .get(&TypeName::new(type_name))
            .cloned()
            .ok_or_else(|| LodestoreError::UnknownType(TypeName::new(type_name)))
    }

    #[must_use]
    pub fn contains_type(&self, type_name: &str) -> bool {
        self.types.read().contains_key(&TypeName::new(type_name))
    }

    /// Registered type names in order.
    #[must_use]
    pub fn type_names(&self) -> Vec<TypeName> {
        self.types.read().keys().cloned().collect()
    }
}

const MODEL_PREFIX: &str = "has_model";

fn validate_name(type_name: &TypeName, name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        Some("name must not be empty")
    } else if name.len() > MAX_NAME_LENGTH {
        Some("name is too long")
    } else if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Some("name may only contain ASCII letters, digits and underscores")
    } else if name.starts_with("system_") || name.starts_with(MODEL_PREFIX) {
        Some("name is reserved")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(LodestoreError::InvalidDescriptor {
            type_name: type_name.clone(),
            attribute: name.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

// =============================================================================
// TESTS
// =============================================================================
