//! Error types for the TAD format crate.

use std::fmt;

use thiserror::Error;

use crate::stream::StreamState;

/// Errors that can occur when reading or writing TAD files.
#[derive(Error, Debug)]
pub enum TadError {
    #[error("Invalid magic bytes: expected TAD\\0, got {0:02x?}")]
    InvalidMagic([u8; 4]),

    #[error("Invalid element type code: {0}")]
    InvalidElementType(u8),

    #[error("{field} out of range: {value}")]
    OutOfRange { field: &'static str, value: u64 },

    #[error("Malformed tag list: {0}")]
    InvalidTagList(String),

    #[error("Invalid tag text {text:?}: {reason}")]
    InvalidTagText { text: String, reason: &'static str },

    #[error("Payload size mismatch: expected {expected} bytes, got {actual}")]
    PayloadSizeMismatch { expected: u64, actual: u64 },

    #[error("Array index {index} out of range (file holds {count} arrays)")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("Allocation too large: requested {requested} bytes, limit is {limit} bytes")]
    AllocationTooLarge { requested: u64, limit: u64 },

    #[error("Unsupported file features: {0}")]
    FeaturesUnsupported(String),

    #[error("Unsupported file format: {0}")]
    FormatUnsupported(String),

    #[error("Seeking not supported: no array index could be built")]
    SeekingNotSupported,

    #[error("Cannot {operation} while the stream is {state}")]
    InvalidState {
        operation: &'static str,
        state: StreamState,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of a [`TadError`], shared by every format backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Open, read, write, seek or flush failed at the OS boundary.
    System,
    /// The bytes on disk (or the array handed in) violate the format.
    InvalidData,
    /// The backend does not offer the requested operation.
    FeaturesUnsupported,
    /// Random access was requested but no index is available.
    SeekingNotSupported,
    /// No backend exists for the requested format.
    FormatUnsupported,
    /// The operation does not match the stream's open state.
    Usage,
}

impl TadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TadError::Io(_) => ErrorKind::System,
            TadError::InvalidMagic(_)
            | TadError::InvalidElementType(_)
            | TadError::OutOfRange { .. }
            | TadError::InvalidTagList(_)
            | TadError::InvalidTagText { .. }
            | TadError::PayloadSizeMismatch { .. }
            | TadError::IndexOutOfRange { .. } => ErrorKind::InvalidData,
            TadError::AllocationTooLarge { .. } | TadError::FeaturesUnsupported(_) => {
                ErrorKind::FeaturesUnsupported
            }
            TadError::SeekingNotSupported => ErrorKind::SeekingNotSupported,
            TadError::FormatUnsupported(_) => ErrorKind::FormatUnsupported,
            TadError::InvalidState { .. } => ErrorKind::Usage,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::System => "system error",
            ErrorKind::InvalidData => "invalid data",
            ErrorKind::FeaturesUnsupported => "unsupported file features",
            ErrorKind::SeekingNotSupported => "seeking not supported",
            ErrorKind::FormatUnsupported => "unsupported file format",
            ErrorKind::Usage => "usage error",
        };
        f.write_str(s)
    }
}

pub type Result<T> = std::result::Result<T, TadError>;
