//! Metadata store error types.
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction.

use derive_more::{Display, Error};

/// A metadata store error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for metadata store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("database error")]
    Database,
    #[display("database migration error")]
    Migration,
    /// A stored value could not be converted to its domain type.
    #[display("invalid metadata: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
    #[display("max rows preference must be between 1 and 500, got {_0}")]
    InvalidPreference(#[error(not(source))] u32),
    #[display("user not found: {_0}")]
    UserNotFound(#[error(not(source))] String),
    #[display("user already exists: {_0}")]
    UserExists(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database)
    }
}
