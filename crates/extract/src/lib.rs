//! Typed row extraction from SQLite database files.
//!
//! A [`Handle`] wraps a read-only connection (and optionally the temporary
//! file it was opened from). [`resolve_table()`] checks a requested table
//! against the live listing, and [`read_all()`] / [`read_filtered()`] turn
//! rows into [`RecordSet`]s of storage-class tagged [`Value`]s.
//!
//! ```no_run
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut handle = dbhub_extract::Handle::open("/tmp/sales.db").await?;
//! let table = dbhub_extract::resolve_table(&mut handle, "").await?;
//! let set = dbhub_extract::read_all(&mut handle, &table, 10).await?;
//! println!("{} of {} rows from {}", set.row_count(), set.total_rows, set.table);
//! handle.close().await;
//! # Ok(())
//! # }
//! ```

mod consts;
pub mod error;
mod handle;
pub mod models;
mod query;
mod rows;
mod schema;
#[cfg(test)]
mod testing;

pub use crate::handle::Handle;
pub use crate::models::{RecordSet, Value};
pub use crate::query::{Filter, Identifier, Operator};
pub use crate::rows::{count_rows, read_all, read_filtered};
pub use crate::schema::{Table, list_columns, list_tables, resolve_table};
