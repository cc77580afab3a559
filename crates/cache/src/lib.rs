//! Ephemeral key/value cache with per-entry expiry.
//!
//! Two tiers share one store: small *metadata* entries (resolved object
//! locations) and larger *output* entries (rendered responses). Entries are
//! written whole and never updated in place.
//!
//! The cache is strictly best-effort. [`lookup`] and [`store`] log and
//! swallow every backend failure so that a broken cache can only ever cost a
//! slower, authoritative response.

pub mod error;
mod store;

pub use crate::store::{MemoryCache, NoCache, SqliteCache};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Entries larger than this are refused rather than stored.
pub const MAX_ENTRY_BYTES: usize = 32 * 1024 * 1024;
/// Stores drop expired entries every this many writes.
pub const PURGE_EVERY_PUTS: usize = 64;

/// Key/value store with a time-to-live on every entry.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// A short name for this store (used in logging).
    fn name(&self) -> &str;

    /// Fetch an entry. Expired entries are reported as missing.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store an entry, replacing any previous value for the key.
    async fn put(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()>;
}

pub type CacheHandle = Arc<dyn CacheStore>;

/// Fetch an entry, treating any backend error as a miss.
pub async fn lookup(cache: &dyn CacheStore, key: &str) -> Option<Vec<u8>> {
    match cache.get(key).await {
        Ok(Some(value)) => {
            tracing::debug!(cache = cache.name(), key, bytes = value.len(), "Cache hit");
            Some(value)
        },
        Ok(None) => {
            tracing::debug!(cache = cache.name(), key, "Cache miss");
            None
        },
        Err(err) => {
            tracing::warn!(cache = cache.name(), key, error = ?err, "Cache read failed; bypassing");
            None
        },
    }
}

/// Store an entry, logging and discarding any backend error.
pub async fn store(cache: &dyn CacheStore, key: &str, value: &[u8], ttl: Duration) {
    if let Err(err) = cache.put(key, value, ttl).await {
        tracing::warn!(cache = cache.name(), key, error = ?err, "Cache write failed; ignoring");
    }
}
