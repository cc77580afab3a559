//! Cache shared between processes through an SQLite file.

use crate::error::{ErrorKind, Result};
use crate::{CacheStore, MAX_ENTRY_BYTES, PURGE_EVERY_PUTS};
use async_trait::async_trait;
use exn::ResultExt;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use time::OffsetDateTime;
use tracing::instrument;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
const MAX_CONNECTIONS: u32 = 4;

/// Cache stored in an SQLite database file.
///
/// Several processes can point at the same file. Losing the file only loses
/// cached responses. Expired rows are purged on connect and every
/// [`PURGE_EVERY_PUTS`] writes.
#[derive(Debug, Clone)]
pub struct SqliteCache {
    pool: SqlitePool,
    puts: Arc<AtomicUsize>,
}

impl SqliteCache {
    async fn new(options: SqliteConnectOptions, max: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max)
            .connect_with(options)
            .await
            .or_raise(|| ErrorKind::Backend)?;
        MIGRATOR.run(&pool).await.or_raise(|| ErrorKind::Migration)?;
        let cache = Self { pool, puts: Arc::default() };
        let purged = cache.purge_expired().await?;
        tracing::debug!(purged, "Purged expired cache entries");
        Ok(cache)
    }

    /// Open (or create) the cache file at `path`.
    #[instrument(level = "debug", skip_all, fields(path = %path.as_ref().display()))]
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            // Losing the last few writes on power failure is acceptable for a cache.
            .synchronous(SqliteSynchronous::Off)
            .busy_timeout(Duration::from_millis(500));
        Self::new(options, MAX_CONNECTIONS).await
    }

    pub async fn connect_in_memory() -> Result<Self> {
        Self::new(SqliteConnectOptions::new().filename(":memory:"), 1).await
    }

    /// Delete every expired entry, returning how many were removed.
    pub async fn purge_expired(&self) -> Result<u64> {
        let result = sqlx::query(include_str!("../../queries/purge_expired.sql"))
            .bind(now_millis())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Backend)?;
        Ok(result.rows_affected())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn now_millis() -> i64 {
    let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    i64::try_from(nanos).unwrap_or(i64::MAX)
}

#[async_trait]
impl CacheStore for SqliteCache {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let row: Option<(Vec<u8>,)> = sqlx::query_as(include_str!("../../queries/get_entry.sql"))
            .bind(key)
            .bind(now_millis())
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Backend)?;
        Ok(row.map(|(value,)| value))
    }

    async fn put(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        if value.len() > MAX_ENTRY_BYTES {
            exn::bail!(ErrorKind::TooLarge(value.len()));
        }
        let ttl = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        sqlx::query(include_str!("../../queries/put_entry.sql"))
            .bind(key)
            .bind(value)
            .bind(now_millis().saturating_add(ttl))
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Backend)?;
        if (self.puts.fetch_add(1, Ordering::Relaxed) + 1).is_multiple_of(PURGE_EVERY_PUTS) {
            match self.purge_expired().await {
                Ok(purged) => tracing::debug!(purged, "Purged expired cache entries"),
                Err(err) => tracing::warn!(error = ?err, "Failed to purge expired cache entries"),
            }
        }
        Ok(())
    }
}
