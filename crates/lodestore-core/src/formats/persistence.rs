//! # Persistence Format
//!
//! Binary encoding for stored records and index documents.
//!
//! Format: Header (5 bytes) + postcard-serialized payload.
//! - 4 bytes: Magic ("LODE")
//! - 1 byte: Version
//!
//! ## Limits
//!
//! Size and header are validated before the payload is deserialized, so a
//! corrupted or oversized value fails fast instead of allocating.

use crate::index::IndexDocument;
use crate::primitives;
use crate::store::StoredRecord;
use crate::types::{LodestoreError, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Maximum size of one encoded record or document (64 MB).
pub const MAX_ENCODED_SIZE: usize = 64 * 1024 * 1024;

const HEADER_SIZE: usize = 5;

// =============================================================================
// HEADER
// =============================================================================

/// The header preceding every encoded value.
#[derive(Debug, Clone, Copy)]
pub struct PersistenceHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl PersistenceHeader {
    /// Header for the current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(LodestoreError::SerializationError(
                "Invalid magic bytes".to_string(),
            ));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(LodestoreError::SerializationError(format!(
                "Unsupported version: {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(LodestoreError::SerializationError(
                "Header too short".to_string(),
            ));
        }
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        Ok(Self {
            magic,
            version: bytes[4],
        })
    }
}

impl Default for PersistenceHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// ENCODING
// =============================================================================

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let payload = postcard::to_stdvec(value)
        .map_err(|e| LodestoreError::SerializationError(e.to_string()))?;
    let mut bytes = Vec::with_capacity(HEADER_SIZE + payload.len());
    bytes.extend_from_slice(&PersistenceHeader::new().to_bytes());
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

fn decode<T: DeserializeOwned>(bytes: &[u8], what: &str) -> Result<T> {
    if bytes.len() < HEADER_SIZE {
        return Err(LodestoreError::SerializationError(format!(
            "{} too short: minimum {} bytes required",
            what, HEADER_SIZE
        )));
    }
    if bytes.len() > MAX_ENCODED_SIZE {
        return Err(LodestoreError::SerializationError(format!(
            "{} size {} bytes exceeds maximum allowed {} bytes",
            what,
            bytes.len(),
            MAX_ENCODED_SIZE
        )));
    }
    PersistenceHeader::from_bytes(bytes)?.validate()?;
    postcard::from_bytes(&bytes[HEADER_SIZE..]).map_err(|e| {
        LodestoreError::SerializationError(format!("Failed to deserialize {}: {}", what, e))
    })
}

/// Encode a stored record.
pub fn encode_record(record: &StoredRecord) -> Result<Vec<u8>> {
    encode(record)
}

/// Decode a stored record.
pub fn decode_record(bytes: &[u8]) -> Result<StoredRecord> {
    decode(bytes, "record")
}

/// Encode an index document.
pub fn encode_document(document: &IndexDocument) -> Result<Vec<u8>> {
    encode(document)
}

/// Decode an index document.
pub fn decode_document(bytes: &[u8]) -> Result<IndexDocument> {
    decode(bytes, "document")
}

// =============================================================================
// TESTS
// =============================================================================
