//! Fixture databases for tests.

use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteJournalMode};
use sqlx::{Connection, Executor};
use tempfile::NamedTempFile;

/// Build a database file by running `statements` against a fresh file.
pub(crate) async fn fixture(statements: &[&str]) -> NamedTempFile {
    let file = tempfile::Builder::new().suffix(".db").tempfile().unwrap();
    let options = SqliteConnectOptions::new()
        .filename(file.path())
        .create_if_missing(true)
        // Keep everything in the main file; nothing else is copied around.
        .journal_mode(SqliteJournalMode::Delete);
    let mut conn = SqliteConnection::connect_with(&options).await.unwrap();
    for statement in statements {
        (&mut conn).execute(*statement).await.unwrap();
    }
    conn.close().await.unwrap();
    file
}
