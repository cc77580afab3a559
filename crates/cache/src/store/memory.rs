//! In-process cache.

use crate::error::{ErrorKind, Result};
use crate::{CacheStore, MAX_ENTRY_BYTES, PURGE_EVERY_PUTS};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

struct Entry {
    expires_at: Instant,
    value: Vec<u8>,
}

/// Cache held in process memory.
///
/// Expired entries are dropped lazily: on the next read of the same key, and
/// all at once every [`PURGE_EVERY_PUTS`] writes.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Entry>>,
    puts: AtomicUsize,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop every expired entry, returning how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.expires_at > now => return Ok(Some(entry.value.clone())),
                Some(_) => {},
                None => return Ok(None),
            }
        }
        // Re-check under the write lock: another task may have refreshed it.
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|entry| entry.expires_at <= now) {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn put(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        if value.len() > MAX_ENTRY_BYTES {
            exn::bail!(ErrorKind::TooLarge(value.len()));
        }
        let entry = Entry { expires_at: Instant::now() + ttl, value: value.to_vec() };
        self.entries.write().await.insert(key.to_string(), entry);
        if (self.puts.fetch_add(1, Ordering::Relaxed) + 1).is_multiple_of(PURGE_EVERY_PUTS) {
            let purged = self.purge_expired().await;
            tracing::debug!(purged, "Purged expired cache entries");
        }
        Ok(())
    }
}
