//! Pipeline error types.
//!
//! Lower crates raise their own kinds; the pipeline raises them into one of
//! these so that the tree keeps the original cause while callers only ever
//! decide between "tell the client" and "log it and say 500".

use derive_more::{Display, Error};
use dbhub_extract::error::ErrorKind as ExtractErrorKind;
use dbhub_render::{ErrorPage, Response};

/// A pipeline error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// No version is visible to the actor. Absent and private look the same.
    #[display("database not found")]
    NotFound,
    /// The request was rejected before touching storage or the database.
    #[display("invalid input: {_0}")]
    InvalidInput(#[error(not(source))] String),
    /// The metadata store couldn't be queried.
    #[display("metadata store unavailable")]
    MetadataUnavailable,
    /// Object storage failed, or doesn't have an object the metadata store
    /// says it should.
    #[display("object storage unavailable")]
    StorageUnavailable,
    #[display("stored object is empty")]
    EmptyObject,
    /// The stored object isn't a readable SQLite database.
    #[display("stored database is malformed")]
    MalformedData,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::MetadataUnavailable | Self::StorageUnavailable)
    }

    /// The page a client is shown for this error.
    pub fn page(&self) -> ErrorPage {
        match self {
            Self::NotFound => ErrorPage::not_found(),
            Self::InvalidInput(message) => ErrorPage::bad_request(message.clone()),
            Self::MetadataUnavailable | Self::StorageUnavailable | Self::EmptyObject | Self::MalformedData => {
                ErrorPage::internal()
            },
        }
    }
}

/// Classify an extraction failure. Request faults keep their message; the
/// rest mean the stored file is unusable.
pub(crate) fn from_extract(kind: &ExtractErrorKind) -> ErrorKind {
    match kind {
        ExtractErrorKind::UnknownTable(_) => ErrorKind::InvalidInput("Requested table does not exist".to_string()),
        ExtractErrorKind::InvalidIdentifier(_) => ErrorKind::InvalidInput("Invalid column name".to_string()),
        ExtractErrorKind::UnknownColumn(_) => ErrorKind::InvalidInput("Requested column does not exist".to_string()),
        ExtractErrorKind::InvalidOperator(_) => ErrorKind::InvalidInput("Invalid comparison operator".to_string()),
        ExtractErrorKind::IncompleteFilter => {
            ErrorKind::InvalidInput("Filter needs a column, an operator and a value".to_string())
        },
        ExtractErrorKind::NoTables | ExtractErrorKind::Open | ExtractErrorKind::Malformed => ErrorKind::MalformedData,
    }
}

/// Raise an extraction error into the pipeline taxonomy.
#[track_caller]
pub(crate) fn raise_extract(err: dbhub_extract::error::Error) -> Error {
    let kind = from_extract(&err);
    err.raise(kind)
}

/// Log a failed request and build the response the client sees.
///
/// Client errors are logged at `warn`, everything else at `error`, both
/// with the full error tree.
pub fn error_response(err: &Error) -> Response {
    let page = err.page();
    if page.is_client_error() {
        tracing::warn!(status = page.status, error = ?err, "Request rejected");
    } else {
        tracing::error!(status = page.status, error = ?err, "Request failed");
    }
    Response::error(&page)
}
