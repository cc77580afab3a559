//! Typed cells and record sets.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::fmt;

/// One cell, tagged with the SQLite storage class it was read as.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Text(String),
    Blob(Vec<u8>),
    Null,
}

impl Value {
    /// Lower-case storage class name.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Blob(_) => "blob",
            Self::Null => "null",
        }
    }

    /// Transport-safe text form, or `None` for NULL.
    ///
    /// Integers are plain decimal, floats are fixed point with four decimals
    /// and blobs are padded standard base64.
    pub fn to_wire(&self) -> Option<String> {
        match self {
            Self::Integer(v) => Some(v.to_string()),
            Self::Float(v) => Some(format!("{v:.4}")),
            Self::Text(v) => Some(v.clone()),
            Self::Blob(v) => Some(BASE64.encode(v)),
            Self::Null => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl fmt::Display for Value {
    /// Same as [`to_wire()`](Self::to_wire), with NULL rendered as `NULL`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_wire() {
            Some(text) => f.write_str(&text),
            None => f.write_str("NULL"),
        }
    }
}

/// Rows read from one table.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSet {
    pub table: String,
    pub columns: Vec<String>,
    pub records: Vec<Vec<Value>>,
    /// Unfiltered `COUNT(*)` of the table, independent of the row limit.
    pub total_rows: i64,
}

impl RecordSet {
    /// Number of rows actually returned.
    pub fn row_count(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
