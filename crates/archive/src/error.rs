//! Archive Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::PathBuf;

/// An archive error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for archive operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Container could not be opened (missing, permissions, not a file).
    #[display("cannot open archive: {}", _0.display())]
    Open(#[error(not(source))] PathBuf),
    /// Container opened, but its header is truncated or not valid JSON.
    #[display("invalid archive header: {}", _0.display())]
    InvalidHeader(#[error(not(source))] PathBuf),
    /// Path contains invalid characters or escapes the archive root
    #[display("invalid path inside archive: {}", _0.display())]
    InvalidPath(#[error(not(source))] PathBuf),
    /// Underlying I/O error
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// Extracted bytes don't match the hash recorded in the header.
    #[display("integrity check failed: expected {expected}, got {actual}")]
    Integrity { expected: String, actual: String },
    #[display("unsupported hash algorithm: {_0}")]
    UnsupportedAlgorithm(#[error(not(source))] String),
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}
