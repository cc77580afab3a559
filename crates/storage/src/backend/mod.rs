//! Storage backend trait and implementations.
//!
//! This module defines the `StorageBackend` trait, which provides a unified
//! interface for object storage across different backends (local filesystem,
//! S3-compatible services, in-memory for tests). Objects are addressed by an
//! [`ObjectRef`]: a bucket and an object id within that bucket.

mod local;
#[cfg(feature = "mock")]
mod mock;
#[cfg(feature = "s3")]
mod s3;

pub use self::local::LocalBackend;
#[cfg(feature = "mock")]
pub use self::mock::MockBackend;
#[cfg(feature = "s3")]
pub use self::s3::S3Backend;
use crate::error::{ErrorKind, Result};
use crate::models::ObjectRef;
use async_trait::async_trait;
use std::pin::Pin;
use tokio::io::{AsyncRead, AsyncReadExt};

/// A `'static` streaming reader over an object's bytes.
pub type BoxAsyncRead = Pin<Box<dyn AsyncRead + Send + 'static>>;

/// Unified interface for object storage backends.
///
/// All storage operations are asynchronous to efficiently handle network
/// operations and concurrent access. Bucket names and object ids must be
/// validated using [`validate_bucket`](crate::validate_bucket) and
/// [`validate_object_id`](crate::validate_object_id) before use;
/// implementations enforce this.
///
/// # Examples
///
/// ```
/// use dbhub_storage::{ObjectRef, StorageBackend, error::Result};
///
/// async fn read_if_stored(backend: &dyn StorageBackend, object: &ObjectRef) -> Result<Option<Vec<u8>>> {
///     if !backend.exists(object).await? {
///         return Ok(None);
///     }
///     Ok(Some(backend.read(object).await?))
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name of the configured backend (used for logging only).
    fn name(&self) -> &str;

    /// Check if an object exists, without counting as a fetch.
    async fn exists(&self, object: &ObjectRef) -> Result<bool>;

    /// Open an object for streaming reads.
    ///
    /// The async setup (opening the file or issuing the request) happens
    /// before returning; the object's bytes are pulled as the reader is
    /// polled. Returns [`NotFound`](crate::error::ErrorKind::NotFound) if
    /// the object does not exist.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use dbhub_storage::{ObjectRef, StorageBackend, error::Result};
    /// use tokio::io::AsyncReadExt;
    /// # async fn example(backend: &dyn StorageBackend) -> Result<()> {
    /// let object = ObjectRef::new("alice", "k3j9x0qa.db");
    /// let mut reader = backend.reader(&object).await?;
    /// let mut header = [0u8; 16];
    /// reader.read_exact(&mut header).await.unwrap();
    /// assert_eq!(&header, b"SQLite format 3\0");
    /// # Ok(())
    /// # }
    /// ```
    async fn reader(&self, object: &ObjectRef) -> Result<BoxAsyncRead>;

    /// Read an entire object into memory.
    ///
    /// Default implementation drains [`reader()`](Self::reader).
    async fn read(&self, object: &ObjectRef) -> Result<Vec<u8>> {
        let mut reader = self.reader(object).await?;
        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer).await.map_err(ErrorKind::Io)?;
        Ok(buffer)
    }

    /// Write an object, creating or replacing it.
    ///
    /// Used by the upload path; the read pipeline never writes.
    async fn write(&self, object: &ObjectRef, data: &[u8]) -> Result<()>;

    /// Delete an object.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the object
    /// does not exist.
    async fn delete(&self, object: &ObjectRef) -> Result<()>;
}
