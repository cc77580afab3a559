use crate::error::{ErrorKind, Result};
use dbhub_extract::{RecordSet, Value};
use exn::ResultExt;
use serde::Serialize;

/// Whitespace in JSON output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Compact,
    Pretty,
}

// Field order here is the field order on the wire.
#[derive(Serialize)]
struct JsonRecordSet<'a> {
    table: &'a str,
    columns: &'a [String],
    row_count: usize,
    total_rows: i64,
    records: Vec<Vec<JsonCell>>,
}

#[derive(Serialize)]
struct JsonCell {
    #[serde(rename = "type")]
    tag: &'static str,
    value: Option<String>,
}

impl From<&Value> for JsonCell {
    fn from(value: &Value) -> Self {
        Self { tag: value.tag(), value: value.to_wire() }
    }
}

/// Serialise a record set.
///
/// An empty result still carries `"records": []`.
pub fn to_json(set: &RecordSet, layout: Layout) -> Result<Vec<u8>> {
    let body = JsonRecordSet {
        table: &set.table,
        columns: &set.columns,
        row_count: set.row_count(),
        total_rows: set.total_rows,
        records: set.records.iter().map(|row| row.iter().map(JsonCell::from).collect()).collect(),
    };
    match layout {
        Layout::Compact => serde_json::to_vec(&body),
        Layout::Pretty => serde_json::to_vec_pretty(&body),
    }
    .or_raise(|| ErrorKind::Json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn set(records: Vec<Vec<Value>>, total_rows: i64) -> RecordSet {
        RecordSet { table: "t".into(), columns: vec!["id".into(), "data".into()], records, total_rows }
    }

    #[test]
    fn test_field_order_and_cells() {
        let set = set(vec![vec![Value::Integer(1), Value::Blob(vec![1, 2, 3])], vec![Value::Float(0.1), Value::Null]], 9);
        let body = String::from_utf8(to_json(&set, Layout::Compact).unwrap()).unwrap();
        assert_eq!(
            body,
            concat!(
                r#"{"table":"t","columns":["id","data"],"row_count":2,"total_rows":9,"records":["#,
                r#"[{"type":"integer","value":"1"},{"type":"blob","value":"AQID"}],"#,
                r#"[{"type":"float","value":"0.1000"},{"type":"null","value":null}]]}"#,
            )
        );
    }

    #[test]
    fn test_empty_result_marker() {
        let body = to_json(&set(Vec::new(), 3), Layout::Pretty).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["records"], json!([]));
        assert_eq!(parsed["row_count"], json!(0));
        assert_eq!(parsed["total_rows"], json!(3));
    }

    #[test]
    fn test_null_and_empty_text_differ() {
        let set = set(vec![vec![Value::Null, Value::Text(String::new())]], 1);
        let parsed: serde_json::Value = serde_json::from_slice(&to_json(&set, Layout::Compact).unwrap()).unwrap();
        assert_eq!(parsed["records"][0][0], json!({"type": "null", "value": null}));
        assert_eq!(parsed["records"][0][1], json!({"type": "text", "value": ""}));
    }
}
