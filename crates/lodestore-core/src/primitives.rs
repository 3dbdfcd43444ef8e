//! # Primitives
//!
//! Hardcoded constants shared by the indexer, the query builder and the
//! persistence format. The indexer and the query side must agree on these
//! without any runtime coordination.

/// Index field holding the type discriminator of every document.
pub const MODEL_FIELD: &str = "has_model_ssim";

/// Index field holding the first-commit timestamp.
pub const CREATED_FIELD: &str = "system_create_dtsi";

/// Index field holding the last-commit timestamp.
pub const MODIFIED_FIELD: &str = "system_modified_dtsi";

/// Suffix of the stored-only field every attribute gets for reification.
pub const STORED_SUFFIX: &str = "ssm";

/// Separator between parent identifiers in a `path` value.
pub const PATH_DELIMITER: char = '/';

/// Attribute key for validation errors that concern the whole object.
pub const BASE_ERROR_KEY: &str = "base";

// =============================================================================
// PAGINATION DEFAULTS
// =============================================================================

/// Page size used when a type does not configure one.
pub const DEFAULT_PER_PAGE: usize = 25;

/// Upper bound on rows per query when a type does not configure one.
pub const MAX_PER_PAGE: usize = 100;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum length for type, attribute and derived index names.
pub const MAX_NAME_LENGTH: usize = 128;

/// Maximum length of a single attribute value (64KB).
pub const MAX_VALUE_LENGTH: usize = 65536;

/// Maximum number of values a multi-valued attribute may hold.
pub const MAX_VALUES_PER_ATTRIBUTE: usize = 10000;

// =============================================================================
// PERSISTENCE FORMAT
// =============================================================================

/// Magic bytes for encoded records and documents.
pub const MAGIC_BYTES: &[u8; 4] = b"LODE";

/// Current serialization format version.
///
/// Increment this when making breaking changes to the serialization format.
pub const FORMAT_VERSION: u8 = 1;
