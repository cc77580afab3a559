//! Extraction error types.

use derive_more::{Display, Error};

/// An extraction error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for extraction operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// The first five are caused by the request and should be reported back to
/// the caller. The rest mean the stored database itself can't be read.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The requested table isn't in the database.
    #[display("requested table does not exist: {_0}")]
    UnknownTable(#[error(not(source))] String),
    /// A column name failed validation.
    #[display("invalid column name: {_0:?}")]
    InvalidIdentifier(#[error(not(source))] String),
    /// A column name passed validation but the table has no such column.
    #[display("requested column does not exist: {_0}")]
    UnknownColumn(#[error(not(source))] String),
    #[display("invalid comparison operator: {_0:?}")]
    InvalidOperator(#[error(not(source))] String),
    /// Only some of the filter column, operator and value were supplied.
    #[display("incomplete filter: column, operator and value are all required")]
    IncompleteFilter,
    /// The database has no user tables.
    #[display("database has no tables")]
    NoTables,
    #[display("could not open database file")]
    Open,
    /// Reading the schema or rows failed part way.
    #[display("database file is malformed")]
    Malformed,
}

impl ErrorKind {
    /// Returns `true` if the request itself was at fault.
    pub fn is_invalid_request(&self) -> bool {
        matches!(
            self,
            Self::UnknownTable(_)
                | Self::InvalidIdentifier(_)
                | Self::UnknownColumn(_)
                | Self::InvalidOperator(_)
                | Self::IncompleteFilter
        )
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // The file is either readable or it isn't.
        false
    }
}
