//! Read-only connections to database files.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{Connection, Executor};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::instrument;

/// An open, read-only database.
///
/// When built from a [`NamedTempFile`] the handle owns it, and dropping or
/// [closing](Self::close) the handle deletes the file. Only `close()` waits
/// for the connection to shut down before unlinking; a dropped connection is
/// closed in the background, possibly after the file is already gone.
#[derive(Debug)]
pub struct Handle {
    conn: SqliteConnection,
    file: Option<NamedTempFile>,
}

impl Handle {
    /// Open an existing database file without taking ownership of it.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Self::connect(path.as_ref()).await?;
        Ok(Self { conn, file: None })
    }

    /// Open a temporary database file, taking ownership of it.
    ///
    /// On failure the file is dropped, and therefore deleted, before returning.
    pub async fn from_temp_file(file: NamedTempFile) -> Result<Self> {
        let conn = Self::connect(file.path()).await?;
        Ok(Self { conn, file: Some(file) })
    }

    #[instrument(level = "debug", skip_all, fields(path = %path.display()))]
    async fn connect(path: &Path) -> Result<SqliteConnection> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .read_only(true)
            // Nobody else writes to this file while it's open.
            .immutable(true);
        let mut conn = SqliteConnection::connect_with(&options).await.or_raise(|| ErrorKind::Open)?;
        // Opening is lazy; the header is only checked on first read.
        let probe = (&mut conn).execute("SELECT count(*) FROM sqlite_master").await;
        if let Err(err) = probe {
            _ = conn.close().await;
            return Err(err).or_raise(|| ErrorKind::Malformed);
        }
        Ok(conn)
    }

    /// Path of the temporary file owned by this handle, if any.
    pub fn temp_path(&self) -> Option<&Path> {
        self.file.as_ref().map(|file| file.path())
    }

    pub(crate) fn connection(&mut self) -> &mut SqliteConnection {
        &mut self.conn
    }

    /// Close the connection and delete the owned temporary file.
    ///
    /// Failures are logged; there's nothing useful a caller could do about
    /// them once the response has been produced.
    pub async fn close(self) {
        let Self { conn, file } = self;
        if let Err(err) = conn.close().await {
            tracing::warn!(error = %err, "Failed to close database connection");
        }
        if let Some(file) = file
            && let Err(err) = file.close()
        {
            tracing::warn!(error = %err, "Failed to delete temporary database file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixture;
    use std::io::Write;

    #[tokio::test]
    async fn test_close_deletes_temp_file() {
        let file = fixture(&["CREATE TABLE t (id INTEGER)"]).await;
        let path = file.path().to_path_buf();
        let handle = Handle::from_temp_file(file).await.unwrap();
        assert_eq!(handle.temp_path(), Some(path.as_path()));
        handle.close().await;
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_drop_deletes_temp_file() {
        let file = fixture(&["CREATE TABLE t (id INTEGER)"]).await;
        let path = file.path().to_path_buf();
        let handle = Handle::from_temp_file(file).await.unwrap();
        drop(handle);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_not_a_database() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"this is definitely not an SQLite database, just some text padding it out")
            .unwrap();
        let path = file.path().to_path_buf();
        let err = Handle::from_temp_file(file).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Malformed | ErrorKind::Open));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_open_does_not_take_ownership() {
        let file = fixture(&["CREATE TABLE t (id INTEGER)"]).await;
        let handle = Handle::open(file.path()).await.unwrap();
        assert_eq!(handle.temp_path(), None);
        handle.close().await;
        assert!(file.path().exists());
    }
}
