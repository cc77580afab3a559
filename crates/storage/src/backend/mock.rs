//! In-memory storage backend for testing.

use crate::backend::BoxAsyncRead;
use crate::error::{ErrorKind, Result};
use crate::{ObjectRef, StorageBackend, validate_bucket, validate_object_id};
use async_trait::async_trait;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

type Key = (String, String);

/// In-memory storage backend for testing.
///
/// Objects are stored in a `HashMap` behind a [`RwLock`], so all trait
/// methods can operate on `&self` without external synchronisation. Every
/// call to [`reader()`](StorageBackend::reader) (and therefore
/// [`read()`](StorageBackend::read)) is counted, which lets pipeline tests
/// assert that a cached response didn't touch object storage. Writes are
/// counted separately.
///
/// # Examples
///
/// ```
/// use dbhub_storage::backend::{MockBackend, StorageBackend};
/// use dbhub_storage::ObjectRef;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MockBackend::with_objects([
///     (ObjectRef::new("alice", "abcd1234.db"), b"SQLite format 3\0".to_vec()),
/// ]);
/// assert!(backend.exists(&ObjectRef::new("alice", "abcd1234.db")).await?);
/// assert_eq!(backend.fetch_count(), 0);
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    name: String,
    storage: RwLock<HashMap<Key, Vec<u8>>>,
    fetches: AtomicUsize,
    writes: AtomicUsize,
    unavailable: AtomicBool,
}

impl MockBackend {
    /// Create a mock backend pre-populated with objects.
    ///
    /// Panics if any bucket or id fails validation. If test setup is wrong,
    /// then test should not pass.
    pub fn with_objects(objects: impl IntoIterator<Item = (ObjectRef, Vec<u8>)>) -> Self {
        let mut map = HashMap::new();
        for (object, data) in objects {
            let Ok(key) = Self::key(&object) else {
                // The panic here is DELIBERATE. MockBackend is intended to be
                // used in tests; panics are expected. There is no error result.
                panic!("MockBackend::with_objects: invalid object {object}");
            };
            map.insert(key, data);
        }
        Self {
            name: "mock".to_string(),
            storage: RwLock::new(map),
            fetches: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Change the name of the mock backend.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Number of times an object has been opened for reading.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Number of successful writes, not counting pre-populated objects.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Simulate a transport failure: while set, every operation fails with
    /// a [`Network`](ErrorKind::Network) error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn key(object: &ObjectRef) -> Result<Key> {
        let bucket = validate_bucket(&object.bucket)?.to_string();
        let id = validate_object_id(&object.id)?;
        Ok((bucket, id))
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            exn::bail!(ErrorKind::Network("mock backend is unavailable".to_string()));
        }
        Ok(())
    }
}
impl Default for MockBackend {
    fn default() -> Self {
        Self::with_objects(Vec::new())
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn exists(&self, object: &ObjectRef) -> Result<bool> {
        let key = Self::key(object)?;
        self.check_available()?;
        Ok(self.storage.read().await.contains_key(&key))
    }

    async fn reader(&self, object: &ObjectRef) -> Result<BoxAsyncRead> {
        let key = Self::key(object)?;
        self.check_available()?;
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let data = self
            .storage
            .read()
            .await
            .get(&key)
            .cloned()
            .ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(object.to_string())))?;
        Ok(Box::pin(Cursor::new(data)))
    }

    async fn write(&self, object: &ObjectRef, data: &[u8]) -> Result<()> {
        let key = Self::key(object)?;
        self.check_available()?;
        self.storage.write().await.insert(key, data.to_vec());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, object: &ObjectRef) -> Result<()> {
        let key = Self::key(object)?;
        self.check_available()?;
        self.storage
            .write()
            .await
            .remove(&key)
            .map(|_| ())
            .ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(object.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(id: &str) -> ObjectRef {
        ObjectRef::new("alice", id)
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let backend = MockBackend::default();
        backend.write(&object("test.db"), b"hello").await.unwrap();
        assert_eq!(backend.read(&object("test.db")).await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_fetches_are_counted() {
        let backend = MockBackend::with_objects([(object("a.db"), b"a".to_vec())]);
        assert_eq!(backend.fetch_count(), 0);
        backend.read(&object("a.db")).await.unwrap();
        backend.read(&object("a.db")).await.unwrap();
        assert_eq!(backend.fetch_count(), 2);
        // Existence checks and writes don't count as fetches
        backend.exists(&object("a.db")).await.unwrap();
        backend.write(&object("b.db"), b"b").await.unwrap();
        assert_eq!(backend.fetch_count(), 2);
        assert_eq!(backend.write_count(), 1);
    }

    #[tokio::test]
    async fn test_read_not_found() {
        let backend = MockBackend::default();
        let err = backend.read(&object("missing.db")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_unavailable() {
        let backend = MockBackend::with_objects([(object("a.db"), b"a".to_vec())]);
        backend.set_unavailable(true);
        let err = backend.read(&object("a.db")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Network(_)));
        assert!(err.is_retryable());
        backend.set_unavailable(false);
        assert_eq!(backend.read(&object("a.db")).await.unwrap(), b"a");
    }

    #[tokio::test]
    async fn test_exists_and_delete() {
        let backend = MockBackend::default();
        backend.write(&object("file.db"), b"12345").await.unwrap();
        assert!(backend.exists(&object("file.db")).await.unwrap());
        backend.delete(&object("file.db")).await.unwrap();
        assert!(!backend.exists(&object("file.db")).await.unwrap());
        let err = backend.delete(&object("file.db")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_traversal_rejected() {
        let backend = MockBackend::default();
        assert!(backend.read(&object("../etc/passwd")).await.is_err());
        assert!(backend.write(&ObjectRef::new("a/b", "x.db"), b"bad").await.is_err());
    }

    #[test]
    #[should_panic(expected = "invalid object")]
    fn test_with_objects_panics_on_bad_id() {
        MockBackend::with_objects([(object("../escape"), b"bad".to_vec())]);
    }
}
