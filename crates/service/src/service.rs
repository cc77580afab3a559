//! The read pipeline: access, cache, materialise, extract, render.

use crate::access::{self, Actor, DatabaseRef};
use crate::error::{Error, ErrorKind, Result, raise_extract};
use crate::keys::{self, OutputParams, ViewKind};
use crate::materialize::materialize;
use dbhub_cache::CacheHandle;
use dbhub_extract::{Filter, Handle, Identifier, RecordSet, read_all, read_filtered, resolve_table};
use dbhub_metastore::{DatabaseVersion, LocatedVersion, NewVersion, QueryTemplate, Repository};
use dbhub_render::{Layout, Response, to_csv, to_json};
use dbhub_storage::{BackendHandle, ObjectRef, validate_bucket};
use exn::ResultExt;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::instrument;

const SQLITE_HEADER: &[u8] = b"SQLite format 3\0";

#[derive(Debug, Clone)]
pub struct Settings {
    pub metadata_ttl: Duration,
    pub output_ttl: Duration,
    /// Table view row limit for anonymous actors and unknown users.
    pub default_max_rows: u32,
    pub visualisation_max_values: u32,
    pub temp_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            metadata_ttl: Duration::from_secs(120),
            output_ttl: Duration::from_secs(1800),
            default_max_rows: 10,
            visualisation_max_values: 2500,
            temp_dir: None,
        }
    }
}

/// A table view: every column, up to the actor's row limit.
#[derive(Debug, Clone)]
pub struct TableRequest {
    pub actor: Actor,
    pub database: DatabaseRef,
    /// Empty picks the first table.
    pub table: String,
}

/// Visualisation data: two columns with an optional single-condition filter.
///
/// Without `x` and `y` every column is returned.
#[derive(Debug, Clone)]
pub struct VisRequest {
    pub actor: Actor,
    pub database: DatabaseRef,
    pub table: String,
    pub x: Option<String>,
    pub y: Option<String>,
    pub filter_column: Option<String>,
    pub filter_operator: Option<String>,
    pub filter_value: Option<String>,
}

/// Every row of one table as CSV.
#[derive(Debug, Clone)]
pub struct CsvRequest {
    pub actor: Actor,
    pub database: DatabaseRef,
    pub table: String,
    pub version: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub actor: Actor,
    pub database: DatabaseRef,
    pub version: Option<u32>,
}

/// What a visualisation request scans, validated before anything is fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Scan {
    All,
    Projected { x: Identifier, y: Identifier, filter: Option<Filter> },
}

impl Scan {
    fn parse(request: &VisRequest) -> Result<Self> {
        fn present(part: &Option<String>) -> Option<&str> {
            part.as_deref().filter(|s| !s.is_empty())
        }
        let filter = Filter::from_parts(
            present(&request.filter_column),
            present(&request.filter_operator),
            present(&request.filter_value),
        )
        .map_err(raise_extract)?;
        match (present(&request.x), present(&request.y)) {
            (Some(x), Some(y)) => Ok(Self::Projected {
                x: Identifier::parse(x).map_err(raise_extract)?,
                y: Identifier::parse(y).map_err(raise_extract)?,
                filter,
            }),
            (None, None) if filter.is_none() => Ok(Self::All),
            (None, None) => exn::bail!(ErrorKind::InvalidInput("Filtering needs both x and y columns".to_string())),
            _ => exn::bail!(ErrorKind::InvalidInput("Both x and y columns are required".to_string())),
        }
    }

    fn params(&self, max_rows: u32) -> OutputParams<'_> {
        match self {
            Self::All => OutputParams { kind: ViewKind::Vis, x: None, y: None, filter: None, max_rows },
            Self::Projected { x, y, filter } => OutputParams {
                kind: ViewKind::Vis,
                x: Some(x.as_str()),
                y: Some(y.as_str()),
                filter: filter.as_ref(),
                max_rows,
            },
        }
    }
}

/// Metadata-tier entry: where a resolved version lives.
#[derive(Debug, Serialize, Deserialize)]
struct CachedLocation {
    object: ObjectRef,
    version: u32,
}

pub struct Service {
    metadata: Repository,
    storage: BackendHandle,
    cache: CacheHandle,
    settings: Settings,
}

impl Service {
    pub fn new(metadata: Repository, storage: BackendHandle, cache: CacheHandle, settings: Settings) -> Self {
        Self { metadata, storage, cache, settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Pretty JSON of a table, limited to the actor's row preference.
    #[instrument(skip_all, fields(actor = %request.actor, database = %request.database, table = %request.table))]
    pub async fn table_view(&self, request: &TableRequest) -> Result<Response> {
        let template = access::resolve(&request.actor, &request.database, None);
        let max_rows = self.max_rows_for(&request.actor).await?;
        let keys = keys::derive_keys(
            &request.actor,
            &request.database,
            &request.table,
            &template,
            &OutputParams::table(max_rows),
        );
        let located = self.locate(&request.database, &template, &keys.metadata).await?;
        if let Some(body) = dbhub_cache::lookup(self.cache.as_ref(), &keys.output).await {
            return Ok(Response::json(body));
        }

        let mut handle = self.materialize(&located).await?;
        let result = read_table(&mut handle, &request.table, &Scan::All, max_rows).await;
        handle.close().await;
        let body = to_json(&result?, Layout::Pretty).or_raise(|| ErrorKind::MalformedData)?;
        dbhub_cache::store(self.cache.as_ref(), &keys.output, &body, self.settings.output_ttl).await;
        Ok(Response::json(body))
    }

    /// Compact JSON for charting, capped at the visualisation limit.
    #[instrument(
        skip_all,
        fields(actor = %request.actor, database = %request.database, table = %request.table, x = ?request.x, y = ?request.y)
    )]
    pub async fn vis_data(&self, request: &VisRequest) -> Result<Response> {
        let scan = Scan::parse(request)?;
        let max_rows = self.settings.visualisation_max_values;
        let template = access::resolve(&request.actor, &request.database, None);
        let keys =
            keys::derive_keys(&request.actor, &request.database, &request.table, &template, &scan.params(max_rows));
        let located = self.locate(&request.database, &template, &keys.metadata).await?;
        if let Some(body) = dbhub_cache::lookup(self.cache.as_ref(), &keys.output).await {
            return Ok(Response::json(body));
        }

        let mut handle = self.materialize(&located).await?;
        let result = read_table(&mut handle, &request.table, &scan, max_rows).await;
        handle.close().await;
        let body = to_json(&result?, Layout::Compact).or_raise(|| ErrorKind::MalformedData)?;
        dbhub_cache::store(self.cache.as_ref(), &keys.output, &body, self.settings.output_ttl).await;
        Ok(Response::json(body))
    }

    /// Every row of a table as a CSV attachment. Not cached.
    #[instrument(
        skip_all,
        fields(actor = %request.actor, database = %request.database, table = %request.table, version = ?request.version)
    )]
    pub async fn download_csv(&self, request: &CsvRequest) -> Result<Response> {
        let template = access::resolve(&request.actor, &request.database, request.version);
        let key = keys::metadata_key(&request.actor, &request.database, &template);
        let located = self.locate(&request.database, &template, &key).await?;

        let mut handle = self.materialize(&located).await?;
        let result = read_table(&mut handle, &request.table, &Scan::All, u32::MAX).await;
        handle.close().await;
        let set = result?;
        let body = to_csv(&set).or_raise(|| ErrorKind::MalformedData)?;
        Ok(Response::csv(&set.table, body))
    }

    /// The stored database file, streamed as-is. Never cached.
    #[instrument(skip_all, fields(actor = %request.actor, database = %request.database, version = ?request.version))]
    pub async fn download(&self, request: &DownloadRequest) -> Result<Response> {
        let template = access::resolve(&request.actor, &request.database, request.version);
        let key = keys::metadata_key(&request.actor, &request.database, &template);
        let located = self.locate(&request.database, &template, &key).await?;
        let reader = self.storage.reader(&located.object).await.or_raise(|| ErrorKind::StorageUnavailable)?;
        tracing::debug!(object = %located.object, version = located.version, "Streaming database");
        Ok(Response::raw(request.database.name(), reader))
    }

    /// Store an uploaded file and record it as the next version.
    ///
    /// The owner is created on first publish, with `bucket` (or their own
    /// name) as their default bucket. Objects are content-addressed, so bytes
    /// already in the bucket aren't uploaded again. If recording the version
    /// fails, an object uploaded by this call is deleted again.
    #[instrument(skip(self, data), fields(database = %database, bytes = data.len()))]
    pub async fn publish(
        &self,
        database: &DatabaseRef,
        data: &[u8],
        public: bool,
        bucket: Option<&str>,
    ) -> Result<DatabaseVersion> {
        if !data.starts_with(SQLITE_HEADER) {
            exn::bail!(ErrorKind::InvalidInput("Not an SQLite database".to_string()));
        }
        let owner = database.owner();
        let user = match self.metadata.get_user(owner).await.or_raise(|| ErrorKind::MetadataUnavailable)? {
            Some(user) => user,
            None => self
                .metadata
                .create_user(owner, bucket.unwrap_or(owner))
                .await
                .or_raise(|| ErrorKind::MetadataUnavailable)?,
        };
        let bucket = bucket.unwrap_or(&user.bucket);
        validate_bucket(bucket).or_raise(|| ErrorKind::InvalidInput("Invalid bucket name".to_string()))?;

        let content_hash = blake3::hash(data).to_hex().to_string();
        let object = ObjectRef::new(bucket, format!("{content_hash}.db"));
        let uploaded = !self.storage.exists(&object).await.or_raise(|| ErrorKind::StorageUnavailable)?;
        if uploaded {
            self.storage.write(&object, data).await.or_raise(|| ErrorKind::StorageUnavailable)?;
        } else {
            tracing::debug!(%object, "Object already stored; skipping upload");
        }
        let new = NewVersion {
            owner: owner.to_string(),
            name: database.name().to_string(),
            object,
            size: data.len() as u64,
            content_hash,
            public,
        };
        match self.metadata.record_version(&new).await {
            Ok(version) => Ok(version),
            Err(err) => {
                if uploaded && let Err(cleanup) = self.storage.delete(&new.object).await {
                    tracing::warn!(object = %new.object, error = ?cleanup, "Failed to remove unrecorded object");
                }
                Err(err).or_raise(|| ErrorKind::MetadataUnavailable)
            },
        }
    }

    async fn max_rows_for(&self, actor: &Actor) -> Result<u32> {
        let Some(username) = actor.username() else {
            return Ok(self.settings.default_max_rows);
        };
        let user = self.metadata.get_user(username).await.or_raise(|| ErrorKind::MetadataUnavailable)?;
        Ok(user.map_or(self.settings.default_max_rows, |user| user.max_rows))
    }

    /// Resolve where a version lives, through the metadata tier.
    ///
    /// Only successful lookups are cached.
    async fn locate(&self, database: &DatabaseRef, template: &QueryTemplate, key: &str) -> Result<LocatedVersion> {
        if let Some(bytes) = dbhub_cache::lookup(self.cache.as_ref(), key).await {
            match serde_json::from_slice::<CachedLocation>(&bytes) {
                Ok(cached) => return Ok(LocatedVersion { object: cached.object, version: cached.version }),
                Err(err) => tracing::warn!(key, error = %err, "Discarding unreadable metadata cache entry"),
            }
        }
        let located = self
            .metadata
            .locate(database.owner(), database.name(), *template)
            .await
            .or_raise(|| ErrorKind::MetadataUnavailable)?
            .ok_or_else(|| Error::from(ErrorKind::NotFound))?;
        let cached = CachedLocation { object: located.object.clone(), version: located.version };
        match serde_json::to_vec(&cached) {
            Ok(bytes) => dbhub_cache::store(self.cache.as_ref(), key, &bytes, self.settings.metadata_ttl).await,
            Err(err) => tracing::warn!(key, error = %err, "Failed to encode metadata cache entry"),
        }
        Ok(located)
    }

    async fn materialize(&self, located: &LocatedVersion) -> Result<Handle> {
        materialize(self.storage.as_ref(), &located.object, self.settings.temp_dir.as_deref()).await
    }
}

async fn read_table(handle: &mut Handle, requested: &str, scan: &Scan, max_rows: u32) -> Result<RecordSet> {
    let table = resolve_table(handle, requested).await.map_err(raise_extract)?;
    let set = match scan {
        Scan::All => read_all(handle, &table, max_rows).await,
        Scan::Projected { x, y, filter } => read_filtered(handle, &table, x, y, max_rows, filter.as_ref()).await,
    };
    set.map_err(raise_extract)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn vis(x: Option<&str>, y: Option<&str>, filter: [Option<&str>; 3]) -> VisRequest {
        let owned = |s: Option<&str>| s.map(str::to_string);
        VisRequest {
            actor: Actor::Anonymous,
            database: DatabaseRef::new("alice", "sales.db").unwrap(),
            table: "t".to_string(),
            x: owned(x),
            y: owned(y),
            filter_column: owned(filter[0]),
            filter_operator: owned(filter[1]),
            filter_value: owned(filter[2]),
        }
    }

    #[test]
    fn test_scan_all_without_columns() {
        assert_eq!(Scan::parse(&vis(None, None, [None; 3])).unwrap(), Scan::All);
        assert_eq!(Scan::parse(&vis(Some(""), Some(""), [Some(""); 3])).unwrap(), Scan::All);
    }

    #[test]
    fn test_scan_projected() {
        let scan = Scan::parse(&vis(Some("id"), Some("name"), [Some("id"), Some(">"), Some("1")])).unwrap();
        let Scan::Projected { x, y, filter } = scan else {
            panic!("expected a projected scan");
        };
        assert_eq!((x.as_str(), y.as_str()), ("id", "name"));
        assert_eq!(filter, Some(Filter::new("id", ">", "1").unwrap()));
    }

    #[rstest]
    #[case::only_x(vis(Some("id"), None, [None; 3]))]
    #[case::filter_without_projection(vis(None, None, [Some("id"), Some("="), Some("1")]))]
    #[case::bad_operator(vis(Some("id"), Some("name"), [Some("id"), Some("=="), Some("1")]))]
    #[case::incomplete_filter(vis(Some("id"), Some("name"), [Some("id"), Some("="), None]))]
    #[case::bad_column(vis(Some("id"), Some("name; DROP TABLE t"), [None; 3]))]
    #[case::keyword(vis(Some("select"), Some("name"), [None; 3]))]
    fn test_scan_rejected(#[case] request: VisRequest) {
        let err = Scan::parse(&request).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidInput(_)));
    }
}
