//! Error types for the segkv storage engine.

use std::fmt;
use std::io;

use crate::record::DataType;

/// The result type used throughout segkv.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for segkv operations.
#[derive(Debug)]
pub enum Error {
    /// An I/O error occurred.
    Io(io::Error),

    /// A truncated or malformed record frame or segment file was detected.
    Corruption(String),

    /// The requested key was not found.
    NotFound(String),

    /// The stored value has a different data type than the one requested.
    TypeMismatch {
        /// The data type the caller asked for.
        expected: DataType,
        /// The data type found in the stored record.
        actual: DataType,
    },

    /// An invalid argument was provided.
    InvalidArgument(String),

    /// The store is in an invalid state for the requested operation.
    InvalidState(String),
}

impl Error {
    /// Creates a new corruption error.
    pub fn corruption(msg: impl Into<String>) -> Self {
        Error::Corruption(msg.into())
    }

    /// Creates a new not found error.
    pub fn not_found(key: impl Into<String>) -> Self {
        Error::NotFound(key.into())
    }

    /// Creates a new invalid argument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Creates a new invalid state error.
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Error::InvalidState(msg.into())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "IO error: {}", e),
            Error::Corruption(msg) => write!(f, "Data corruption: {}", msg),
            Error::NotFound(key) => write!(f, "Key not found: {}", key),
            Error::TypeMismatch { expected, actual } => {
                write!(f, "Type mismatch: expected {:?}, got {:?}", expected, actual)
            }
            Error::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            Error::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::corruption("truncated frame");
        assert_eq!(err.to_string(), "Data corruption: truncated frame");

        let err = Error::not_found("missing-key");
        assert_eq!(err.to_string(), "Key not found: missing-key");

        let err = Error::TypeMismatch { expected: DataType::String, actual: DataType::Int64 };
        assert!(err.to_string().contains("String"));
        assert!(err.to_string().contains("Int64"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
