//! Object storage to a private temporary file, opened read-only.

use crate::error::{ErrorKind, Result, raise_extract};
use dbhub_extract::Handle;
use dbhub_storage::{ObjectRef, StorageBackend};
use exn::ResultExt;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::instrument;

const TEMP_PREFIX: &str = "dbhub-";
const TEMP_SUFFIX: &str = ".db";

/// Copy `object` into a fresh temporary file and open it.
///
/// The returned [`Handle`] owns the file: closing or dropping it removes
/// the file, and any failure here removes it before returning. A missing
/// object is [`ErrorKind::StorageUnavailable`] rather than not found, since
/// the metadata store already said it exists.
#[instrument(level = "debug", skip(backend), fields(backend = backend.name(), object = %object))]
pub async fn materialize(backend: &dyn StorageBackend, object: &ObjectRef, temp_dir: Option<&Path>) -> Result<Handle> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(TEMP_PREFIX).suffix(TEMP_SUFFIX);
    let temp = match temp_dir {
        Some(dir) => builder.tempfile_in(dir),
        None => builder.tempfile(),
    }
    .or_raise(|| ErrorKind::StorageUnavailable)?;

    let mut reader = backend.reader(object).await.or_raise(|| ErrorKind::StorageUnavailable)?;
    let file = temp.as_file().try_clone().or_raise(|| ErrorKind::StorageUnavailable)?;
    let mut writer = tokio::fs::File::from_std(file);
    let copied = tokio::io::copy(&mut reader, &mut writer).await.or_raise(|| ErrorKind::StorageUnavailable)?;
    writer.flush().await.or_raise(|| ErrorKind::StorageUnavailable)?;
    drop(writer);

    if copied == 0 {
        exn::bail!(ErrorKind::EmptyObject);
    }
    tracing::debug!(bytes = copied, path = %temp.path().display(), "Materialised database");
    Handle::from_temp_file(temp).await.map_err(raise_extract)
}
