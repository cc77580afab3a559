//! Table listing and validation.

use crate::Handle;
use crate::error::{ErrorKind, Result};
use crate::query::{Identifier, quote_identifier};
use exn::ResultExt;
use futures::TryStreamExt;
use sqlx::Row;
use std::fmt;
use tracing::instrument;

const LIST_TABLES: &str = "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'";
const LIST_COLUMNS: &str = "SELECT name FROM pragma_table_info(?)";

/// A table name confirmed to exist in an open database.
///
/// Only [`resolve_table()`] builds one, so any `Table` reaching a statement
/// was checked against the live listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Table(String);

impl Table {
    #[cfg(test)]
    pub(crate) fn new_unchecked(name: &str) -> Self {
        Self(name.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn quoted(&self) -> String {
        quote_identifier(&self.0)
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// User tables in the order SQLite lists them. Internal `sqlite_*` tables
/// are excluded.
///
/// Returns [`ErrorKind::NoTables`] if there aren't any.
#[instrument(level = "debug", skip(handle))]
pub async fn list_tables(handle: &mut Handle) -> Result<Vec<String>> {
    let mut tables = Vec::new();
    let mut rows = sqlx::query(LIST_TABLES).fetch(handle.connection());
    while let Some(row) = rows.try_next().await.or_raise(|| ErrorKind::Malformed)? {
        tables.push(row.try_get::<String, _>(0).or_raise(|| ErrorKind::Malformed)?);
    }
    if tables.is_empty() {
        exn::bail!(ErrorKind::NoTables);
    }
    Ok(tables)
}

/// Resolve a requested table name against the live listing.
///
/// An empty request picks the first listed table. A non-empty request that
/// isn't listed is [`ErrorKind::UnknownTable`]; there's no fallback.
pub async fn resolve_table(handle: &mut Handle, requested: &str) -> Result<Table> {
    let tables = list_tables(handle).await?;
    if requested.is_empty() {
        // list_tables() never returns an empty list.
        return tables.into_iter().next().map(Table).ok_or_else(|| ErrorKind::NoTables.into());
    }
    match tables.into_iter().find(|name| name == requested) {
        Some(name) => Ok(Table(name)),
        None => exn::bail!(ErrorKind::UnknownTable(requested.to_string())),
    }
}

/// Column names of a resolved table, in declaration order.
#[instrument(level = "debug", skip(handle), fields(table = %table))]
pub async fn list_columns(handle: &mut Handle, table: &Table) -> Result<Vec<String>> {
    sqlx::query_scalar::<_, String>(LIST_COLUMNS)
        .bind(table.as_str())
        .fetch_all(handle.connection())
        .await
        .or_raise(|| ErrorKind::Malformed)
}

/// Check that `table` has a column called `column`.
///
/// SQLite compares column names case-insensitively, and so does this.
pub(crate) fn ensure_column(columns: &[String], column: &Identifier) -> Result<()> {
    if !columns.iter().any(|name| name.eq_ignore_ascii_case(column.as_str())) {
        exn::bail!(ErrorKind::UnknownColumn(column.to_string()));
    }
    Ok(())
}
