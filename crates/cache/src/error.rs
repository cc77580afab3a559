//! Cache error types.
//!
//! Cache errors never fail a request. Callers log them and fall through to
//! the authoritative path (see [`crate::lookup`] and [`crate::store`]).

use derive_more::{Display, Error};

/// A cache error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("cache backend error")]
    Backend,
    #[display("cache migration error")]
    Migration,
    #[display("cache entry too large: {_0} bytes")]
    TooLarge(#[error(not(source))] usize),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Backend)
    }
}
