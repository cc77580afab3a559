use crate::error::{ErrorKind, Result};
use dbhub_extract::RecordSet;
use exn::ResultExt;

/// Write every row as an RFC 4180 record, without a header row.
///
/// NULL cells are written as the literal text `NULL`.
pub fn to_csv(set: &RecordSet) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    for row in &set.records {
        writer.write_record(row.iter().map(ToString::to_string)).or_raise(|| ErrorKind::Csv)?;
    }
    writer.into_inner().map_err(|e| e.into_error()).or_raise(|| ErrorKind::Csv)
}
