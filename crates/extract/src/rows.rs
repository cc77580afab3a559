//! Typed row extraction.

use crate::Handle;
use crate::error::{ErrorKind, Result};
use crate::models::{RecordSet, Value};
use crate::query::{self, Filter, Identifier};
use crate::schema::{Table, ensure_column, list_columns};
use exn::ResultExt;
use futures::TryStreamExt;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Executor, Row, Statement, TypeInfo, ValueRef};
use tracing::instrument;

/// Read up to `max_rows` rows of every column.
#[instrument(level = "debug", skip_all, fields(table = %table, max_rows = max_rows))]
pub async fn read_all(handle: &mut Handle, table: &Table, max_rows: u32) -> Result<RecordSet> {
    let sql = query::select_all(table);
    let (columns, records) = fetch(handle, &sql, None, max_rows).await?;
    let total_rows = count_rows(handle, table).await?;
    Ok(RecordSet { table: table.to_string(), columns, records, total_rows })
}

/// Read up to `max_rows` rows of the `x` and `y` columns, optionally
/// filtered by one condition.
///
/// Every named column is checked against the table first: SQLite reads an
/// unresolvable double-quoted name as a string literal, which would match
/// every row or none instead of failing.
#[instrument(
    level = "debug",
    skip_all,
    fields(table = %table, x = %x, y = %y, max_rows = max_rows, filtered = filter.is_some())
)]
pub async fn read_filtered(
    handle: &mut Handle,
    table: &Table,
    x: &Identifier,
    y: &Identifier,
    max_rows: u32,
    filter: Option<&Filter>,
) -> Result<RecordSet> {
    let known = list_columns(handle, table).await?;
    for column in [Some(x), Some(y), filter.map(|f| &f.column)].into_iter().flatten() {
        ensure_column(&known, column)?;
    }
    let sql = query::select_projected(table, x, y, filter);
    let (columns, records) = fetch(handle, &sql, filter.map(|f| f.value.as_str()), max_rows).await?;
    let total_rows = count_rows(handle, table).await?;
    Ok(RecordSet { table: table.to_string(), columns, records, total_rows })
}

/// Unfiltered `COUNT(*)` of a table.
pub async fn count_rows(handle: &mut Handle, table: &Table) -> Result<i64> {
    let (count,): (i64,) =
        sqlx::query_as(&query::count(table)).fetch_one(handle.connection()).await.or_raise(|| ErrorKind::Malformed)?;
    Ok(count)
}

/// Run a statement ending in `LIMIT ?`, with an optional bound filter value
/// before the limit.
///
/// Column names come from the prepared statement so that they're known even
/// when no rows match.
async fn fetch(
    handle: &mut Handle,
    sql: &str,
    filter_value: Option<&str>,
    max_rows: u32,
) -> Result<(Vec<String>, Vec<Vec<Value>>)> {
    let conn = handle.connection();
    let statement = (&mut *conn).prepare(sql).await.or_raise(|| ErrorKind::Malformed)?;
    let columns = statement.columns().iter().map(|c| c.name().to_string()).collect::<Vec<_>>();
    let mut query = sqlx::query(sql);
    if let Some(value) = filter_value {
        query = query.bind(value);
    }
    let mut rows = query.bind(i64::from(max_rows)).fetch(&mut *conn);
    let mut records = Vec::new();
    while let Some(row) = rows.try_next().await.or_raise(|| ErrorKind::Malformed)? {
        records.push(decode_row(&row, columns.len())?);
    }
    Ok((columns, records))
}

fn decode_row(row: &SqliteRow, width: usize) -> Result<Vec<Value>> {
    (0..width).map(|i| decode_cell(row, i)).collect()
}

/// Decode one cell according to the storage class of the stored value, not
/// the column's declared type.
fn decode_cell(row: &SqliteRow, index: usize) -> Result<Value> {
    let raw = row.try_get_raw(index).or_raise(|| ErrorKind::Malformed)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let class = raw.type_info().name().to_string();
    let value = match class.as_str() {
        "INTEGER" => Value::Integer(row.try_get_unchecked(index).or_raise(|| ErrorKind::Malformed)?),
        "REAL" => Value::Float(row.try_get_unchecked(index).or_raise(|| ErrorKind::Malformed)?),
        "TEXT" => Value::Text(row.try_get_unchecked(index).or_raise(|| ErrorKind::Malformed)?),
        "BLOB" => Value::Blob(row.try_get_unchecked(index).or_raise(|| ErrorKind::Malformed)?),
        other => {
            tracing::debug!(storage_class = other, index, "Unexpected storage class");
            exn::bail!(ErrorKind::Malformed)
        },
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve_table;
    use crate::testing::fixture;

    const SCENARIO: &[&str] = &[
        "CREATE TABLE t (id INTEGER, name TEXT)",
        "INSERT INTO t VALUES (1, 'a'), (2, 'b'), (3, 'c')",
    ];

    async fn open(statements: &[&str]) -> (Handle, Table) {
        let mut handle = Handle::from_temp_file(fixture(statements).await).await.unwrap();
        let table = resolve_table(&mut handle, "").await.unwrap();
        (handle, table)
    }

    fn ident(name: &str) -> Identifier {
        Identifier::parse(name).unwrap()
    }

    #[tokio::test]
    async fn test_read_all_every_storage_class() {
        let (mut handle, table) = open(&[
            "CREATE TABLE mixed (i INTEGER, f REAL, t TEXT, b BLOB, n)",
            "INSERT INTO mixed VALUES (42, 3.14159265, 'zoë ✓', x'DEADBEEF', NULL)",
            "INSERT INTO mixed VALUES (-7, 0.5, '', x'', NULL)",
        ])
        .await;
        let set = read_all(&mut handle, &table, 10).await.unwrap();
        assert_eq!(set.table, "mixed");
        assert_eq!(set.columns, ["i", "f", "t", "b", "n"]);
        assert_eq!(set.total_rows, 2);
        assert_eq!(
            set.records[0],
            vec![
                Value::Integer(42),
                Value::Float(3.14159265),
                Value::Text("zoë ✓".into()),
                Value::Blob(vec![0xDE, 0xAD, 0xBE, 0xEF]),
                Value::Null,
            ]
        );
        let wire = set.records[0].iter().map(Value::to_wire).collect::<Vec<_>>();
        assert_eq!(
            wire,
            vec![Some("42".into()), Some("3.1416".into()), Some("zoë ✓".into()), Some("3q2+7w==".into()), None]
        );
        // Empty text and empty blob are not NULL
        assert_eq!(set.records[1][2], Value::Text(String::new()));
        assert_eq!(set.records[1][3], Value::Blob(Vec::new()));
        handle.close().await;
    }

    #[tokio::test]
    async fn test_storage_class_wins_over_declared_type() {
        let (mut handle, table) = open(&[
            "CREATE TABLE loose (v TEXT)",
            "INSERT INTO loose VALUES (x'00'), (NULL)",
            "CREATE TABLE any_type (v)",
            "INSERT INTO any_type VALUES (1), (1.5), ('one')",
        ])
        .await;
        let set = read_all(&mut handle, &table, 10).await.unwrap();
        assert_eq!(set.records, vec![vec![Value::Blob(vec![0])], vec![Value::Null]]);
        let any = resolve_table(&mut handle, "any_type").await.unwrap();
        let set = read_all(&mut handle, &any, 10).await.unwrap();
        assert_eq!(
            set.records,
            vec![vec![Value::Integer(1)], vec![Value::Float(1.5)], vec![Value::Text("one".into())]]
        );
        handle.close().await;
    }

    #[tokio::test]
    async fn test_max_rows_limits_records_but_not_total() {
        let (mut handle, table) = open(SCENARIO).await;
        let set = read_all(&mut handle, &table, 2).await.unwrap();
        assert_eq!(set.row_count(), 2);
        assert_eq!(set.total_rows, 3);
        handle.close().await;
    }

    #[tokio::test]
    async fn test_zero_max_rows() {
        let (mut handle, table) = open(SCENARIO).await;
        let set = read_all(&mut handle, &table, 0).await.unwrap();
        assert!(set.is_empty());
        assert_eq!(set.columns, ["id", "name"]);
        assert_eq!(set.total_rows, 3);
        handle.close().await;
    }

    #[tokio::test]
    async fn test_filtered_scenario() {
        let (mut handle, table) = open(SCENARIO).await;
        let filter = Filter::new("id", ">", "1").unwrap();
        let set = read_filtered(&mut handle, &table, &ident("id"), &ident("name"), 10, Some(&filter)).await.unwrap();
        assert_eq!(
            set.records,
            vec![vec![Value::Integer(2), Value::Text("b".into())], vec![Value::Integer(3), Value::Text("c".into())]]
        );
        assert_eq!(set.total_rows, 3);
        handle.close().await;
    }

    #[tokio::test]
    async fn test_filtered_without_filter_and_like() {
        let (mut handle, table) = open(SCENARIO).await;
        let set = read_filtered(&mut handle, &table, &ident("name"), &ident("id"), 10, None).await.unwrap();
        assert_eq!(set.columns, ["name", "id"]);
        assert_eq!(set.row_count(), 3);
        let like = Filter::new("name", "LIKE", "b%").unwrap();
        let set = read_filtered(&mut handle, &table, &ident("id"), &ident("name"), 10, Some(&like)).await.unwrap();
        assert_eq!(set.records, vec![vec![Value::Integer(2), Value::Text("b".into())]]);
        handle.close().await;
    }

    #[tokio::test]
    async fn test_filter_value_is_bound_not_interpolated() {
        let (mut handle, table) = open(SCENARIO).await;
        let filter = Filter::new("name", "=", "a' OR '1'='1").unwrap();
        let set = read_filtered(&mut handle, &table, &ident("id"), &ident("name"), 10, Some(&filter)).await.unwrap();
        assert!(set.is_empty());
        assert_eq!(count_rows(&mut handle, &table).await.unwrap(), 3);
        handle.close().await;
    }

    #[tokio::test]
    async fn test_unknown_column_is_rejected() {
        let (mut handle, table) = open(SCENARIO).await;
        let err =
            read_filtered(&mut handle, &table, &ident("id"), &ident("missing"), 10, None).await.unwrap_err();
        assert_eq!(&*err, &ErrorKind::UnknownColumn("missing".to_string()));
        handle.close().await;
    }

    #[tokio::test]
    async fn test_misspelled_filter_column_is_rejected() {
        let (mut handle, table) = open(SCENARIO).await;
        // Quoted, "idd" = 'idd' would compare two literals and match every row.
        let filter = Filter::new("idd", "=", "idd").unwrap();
        let err = read_filtered(&mut handle, &table, &ident("id"), &ident("name"), 10, Some(&filter))
            .await
            .unwrap_err();
        assert_eq!(&*err, &ErrorKind::UnknownColumn("idd".to_string()));
        handle.close().await;
    }

    #[tokio::test]
    async fn test_column_names_are_case_insensitive() {
        let (mut handle, table) = open(SCENARIO).await;
        let filter = Filter::new("ID", "=", "2").unwrap();
        let set =
            read_filtered(&mut handle, &table, &ident("Id"), &ident("NAME"), 10, Some(&filter)).await.unwrap();
        assert_eq!(set.records, vec![vec![Value::Integer(2), Value::Text("b".into())]]);
        handle.close().await;
    }

    #[tokio::test]
    async fn test_table_names_needing_quotes() {
        let (mut handle, _) = open(&[
            r#"CREATE TABLE "order items" (qty INTEGER)"#,
            r#"INSERT INTO "order items" VALUES (5)"#,
        ])
        .await;
        let table = resolve_table(&mut handle, "order items").await.unwrap();
        let set = read_all(&mut handle, &table, 10).await.unwrap();
        assert_eq!(set.records, vec![vec![Value::Integer(5)]]);
        handle.close().await;
    }
}
