//! Error types for the block-tree term dictionary.
//!
//! All fallible operations return [`Result`], whose error type is
//! [`BlockTreeError`]. Corrupt on-disk data is always reported through
//! [`BlockTreeError::CorruptIndex`] or [`BlockTreeError::IndexFormat`], so callers
//! can tell a damaged segment apart from a programming mistake.
//!
//! # Examples
//!
//! ```
//! use blocktree::error::{BlockTreeError, Result};
//!
//! fn open_segment() -> Result<()> {
//!     Err(BlockTreeError::corrupt("invalid numFields: -1"))
//! }
//!
//! let err = open_segment().unwrap_err();
//! assert!(err.is_corruption());
//! ```

use std::io;

use thiserror::Error;

/// The main error type for block-tree operations.
#[derive(Error, Debug)]
pub enum BlockTreeError {
    /// I/O errors raised by the underlying storage.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The on-disk layout is inconsistent.
    #[error("Corrupt index: {0}")]
    CorruptIndex(String),

    /// The header carries a version this reader cannot handle.
    #[error("Unsupported index format: {0}")]
    IndexFormat(String),

    /// A caller supplied an out-of-range or malformed argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// An operation was used in the wrong state.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Storage-related errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Errors raised by the FST library while building or loading an index.
    #[error("FST error: {0}")]
    Fst(#[from] fst::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error for other cases
    #[error("Error: {0}")]
    Other(String),
}

/// Result type alias for operations that may fail with BlockTreeError.
pub type Result<T> = std::result::Result<T, BlockTreeError>;

impl BlockTreeError {
    /// Create a new corrupt index error.
    pub fn corrupt<S: Into<String>>(msg: S) -> Self {
        BlockTreeError::CorruptIndex(msg.into())
    }

    /// Create a new index format error.
    pub fn index_format<S: Into<String>>(msg: S) -> Self {
        BlockTreeError::IndexFormat(msg.into())
    }

    /// Create a new invalid argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        BlockTreeError::InvalidArgument(msg.into())
    }

    /// Create a new invalid operation error.
    pub fn invalid_operation<S: Into<String>>(msg: S) -> Self {
        BlockTreeError::InvalidOperation(msg.into())
    }

    /// Create a new storage error.
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        BlockTreeError::Storage(msg.into())
    }

    /// Create a new generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        BlockTreeError::Other(msg.into())
    }

    /// Returns true if this error means the stored data cannot be trusted.
    ///
    /// Reading past the end of a stream counts as corruption: a well-formed
    /// dictionary never asks for bytes it did not write.
    pub fn is_corruption(&self) -> bool {
        match self {
            BlockTreeError::CorruptIndex(_) | BlockTreeError::IndexFormat(_) => true,
            BlockTreeError::Io(e) => e.kind() == io::ErrorKind::UnexpectedEof,
            BlockTreeError::Fst(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_construction() {
        let error = BlockTreeError::corrupt("bad entry count");
        assert_eq!(error.to_string(), "Corrupt index: bad entry count");

        let error = BlockTreeError::invalid_argument("minItemsInBlock must be >= 2");
        assert_eq!(
            error.to_string(),
            "Invalid argument: minItemsInBlock must be >= 2"
        );

        let error = BlockTreeError::invalid_operation("cursor is not positioned");
        assert_eq!(
            error.to_string(),
            "Invalid operation: cursor is not positioned"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let error = BlockTreeError::from(io_error);

        match error {
            BlockTreeError::Io(_) => {} // Expected
            _ => panic!("Expected IO error variant"),
        }
    }

    #[test]
    fn test_corruption_classification() {
        assert!(BlockTreeError::corrupt("x").is_corruption());
        assert!(BlockTreeError::index_format("x").is_corruption());
        assert!(BlockTreeError::from(io::Error::from(io::ErrorKind::UnexpectedEof)).is_corruption());
        assert!(!BlockTreeError::invalid_operation("x").is_corruption());
        assert!(!BlockTreeError::from(io::Error::from(io::ErrorKind::NotFound)).is_corruption());
    }
}
