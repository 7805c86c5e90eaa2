//! Centralized error types for the pakscan workspace.

use crate::types::{PackageIndex, Section};
use thiserror::Error;

/// Top-level error enum. Variants follow the failure taxonomy of a scan:
/// only `Stream` and `HeaderMismatch` suppress a result for a file.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PakError {
    #[error("Stream failure for {path}: {reason}")]
    Stream { path: String, reason: String },

    #[error("Header mismatch: {0}")]
    HeaderMismatch(String),

    #[error("Section {section} failed: {source}")]
    SectionDecode {
        section: Section,
        #[source]
        source: DecodeError,
    },

    #[error("Unresolved reference: {0}")]
    UnresolvedReference(PackageIndex),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PakError {
    pub fn stream(path: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Stream {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Low-level failure while decoding bytes.
///
/// `Clone` + `PartialEq` so diagnostics can be stored on a summary and
/// compared in tests.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum DecodeError {
    #[error("unexpected end of data at offset {offset} (needed {needed} bytes)")]
    UnexpectedEof { offset: usize, needed: usize },

    #[error("offset {offset} is outside the {len}-byte buffer")]
    InvalidOffset { offset: i64, len: usize },

    #[error("negative count {0}")]
    NegativeCount(i32),

    #[error("string length {0} exceeds the allowed maximum")]
    StringTooLong(i32),

    #[error("malformed string at offset {0}")]
    InvalidString(usize),

    #[error("boolean field holds {value} at offset {offset}")]
    InvalidBool { offset: usize, value: u32 },

    #[error("name index {index} out of range (table has {len} names)")]
    NameIndexOutOfRange { index: i32, len: usize },

    #[error("name table unavailable")]
    NameTableUnavailable,
}

pub type PakResult<T> = Result<T, PakError>;
