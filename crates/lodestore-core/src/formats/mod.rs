//! # Formats
//!
//! Byte-level encodings shared by the redb backends.

pub mod persistence;

pub use persistence::{
    MAX_ENCODED_SIZE, PersistenceHeader, decode_document, decode_record, encode_document,
    encode_record,
};
