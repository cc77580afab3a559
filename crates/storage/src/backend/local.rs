//! Local filesystem storage backend.
//!
//! Objects are stored as `<root>/<bucket>/<object id>` and accessed using
//! `tokio::fs` for async I/O.

use crate::backend::BoxAsyncRead;
use crate::error::{ErrorKind, Result};
use crate::{ObjectRef, StorageBackend, validate_bucket, validate_object_id};
use async_trait::async_trait;
use std::fs::create_dir_all as sync_create_dir;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Local filesystem storage backend.
///
/// Stores objects in a directory on the local filesystem. Each bucket is a
/// subdirectory of the configured root.
///
/// # Examples
///
/// ```no_run
/// use dbhub_storage::backend::LocalBackend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = LocalBackend::new("local", "/var/lib/dbhub/objects")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LocalBackend {
    name: String,
    /// Root directory containing one directory per bucket
    root: PathBuf,
}
impl LocalBackend {
    /// Create a new local filesystem backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not absolute, or exists but isn't a
    /// directory.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::BackendError(format!("storage root must be absolute: {}", root.display())));
        }
        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::BackendError(format!("storage root is not a directory: {}", root.display())));
            }
        } else {
            // Use non-async here; it'll only happen once on startup and it's
            // not worth the hassle of making the constructor async.
            sync_create_dir(&root).map_err(|e| Self::map_io_error(e, &root.display().to_string()))?;
        }
        Ok(Self { name: name.into(), root })
    }

    /// Get the absolute path for an object, validating bucket and id.
    fn absolute_path(&self, object: &ObjectRef) -> Result<PathBuf> {
        let bucket = validate_bucket(&object.bucket)?;
        let id = validate_object_id(&object.id)?;
        Ok(self.root.join(bucket).join(id))
    }

    fn map_io_error(e: std::io::Error, object: &str) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(object.to_string()),
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(object.to_string()),
            _ => ErrorKind::Io(e),
        }
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn exists(&self, object: &ObjectRef) -> Result<bool> {
        let path = self.absolute_path(object)?;
        Ok(fs::try_exists(&path).await.map_err(ErrorKind::Io)?)
    }

    async fn reader(&self, object: &ObjectRef) -> Result<BoxAsyncRead> {
        let path = self.absolute_path(object)?;
        let file = fs::File::open(&path).await.map_err(|e| Self::map_io_error(e, &object.to_string()))?;
        Ok(Box::pin(file))
    }

    async fn write(&self, object: &ObjectRef, data: &[u8]) -> Result<()> {
        let path = self.absolute_path(object)?;
        // Create parent directories if needed, to keep behaviour
        // consistent with S3-compatible storage.
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| Self::map_io_error(e, &object.to_string()))?;
        }
        Ok(fs::write(&path, data).await.map_err(|e| Self::map_io_error(e, &object.to_string()))?)
    }

    async fn delete(&self, object: &ObjectRef) -> Result<()> {
        let path = self.absolute_path(object)?;
        Ok(fs::remove_file(&path).await.map_err(|e| Self::map_io_error(e, &object.to_string()))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    fn object(id: &str) -> ObjectRef {
        ObjectRef::new("alice", id)
    }

    #[test]
    fn test_new_requires_absolute_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(LocalBackend::new("name", temp_dir.path()).is_ok());
        assert!(LocalBackend::new("name", "relative/path").is_err());
        assert!(LocalBackend::new("name", "./relative").is_err());
    }

    #[test]
    fn test_absolute_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        let expected = temp_dir.path().join("alice").join("abcd1234.db");
        assert_eq!(backend.absolute_path(&object("abcd1234.db")).unwrap(), expected);
        // Escaping the bucket is prevented
        assert!(backend.absolute_path(&object("../bob/abcd1234.db")).is_err());
        assert!(backend.absolute_path(&ObjectRef::new("..", "x.db")).is_err());
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        backend.write(&object("test.db"), b"Hello, world!").await.unwrap();
        assert_eq!(backend.read(&object("test.db")).await.unwrap(), b"Hello, world!");
    }

    #[tokio::test]
    async fn test_reader_streams_contents() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        backend.write(&object("stream.db"), b"0123456789").await.unwrap();
        let mut reader = backend.reader(&object("stream.db")).await.unwrap();
        let mut head = [0u8; 4];
        reader.read_exact(&mut head).await.unwrap();
        assert_eq!(&head, b"0123");
    }

    #[tokio::test]
    async fn test_reader_not_found() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        let Err(err) = backend.reader(&object("missing.db")).await else {
            panic!("expected missing object to fail");
        };
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_exists_and_delete() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        assert!(!backend.exists(&object("file.db")).await.unwrap());
        backend.write(&object("file.db"), b"data").await.unwrap();
        assert!(backend.exists(&object("file.db")).await.unwrap());
        backend.delete(&object("file.db")).await.unwrap();
        assert!(!backend.exists(&object("file.db")).await.unwrap());
        let err = backend.delete(&object("file.db")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_nested_object_ids() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        backend.write(&object("nested/file.db"), b"12345").await.unwrap();
        assert!(temp_dir.path().join("alice/nested/file.db").is_file());
        assert!(backend.exists(&object("nested/file.db")).await.unwrap());
    }

    #[tokio::test]
    async fn test_buckets_are_separate() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        backend.write(&ObjectRef::new("alice", "same.db"), b"alice").await.unwrap();
        backend.write(&ObjectRef::new("bob", "same.db"), b"bob").await.unwrap();
        assert_eq!(backend.read(&ObjectRef::new("alice", "same.db")).await.unwrap(), b"alice");
        assert_eq!(backend.read(&ObjectRef::new("bob", "same.db")).await.unwrap(), b"bob");
    }
}
