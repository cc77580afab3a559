use crate::error::{Error, ErrorKind};
use dbhub_storage::ObjectRef;
use exn::ResultExt;
use time::OffsetDateTime;

/// Where a resolved database version lives in object storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedVersion {
    pub object: ObjectRef,
    pub version: u32,
}

/// One immutable version of a database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseVersion {
    pub owner: String,
    pub name: String,
    pub version: u32,
    pub object: ObjectRef,
    pub size: u64,
    /// BLAKE3 hex digest of the uploaded bytes.
    pub content_hash: String,
    pub public: bool,
    pub created_at: OffsetDateTime,
}

/// A freshly stored upload, waiting for a version number.
#[derive(Debug, Clone)]
pub struct NewVersion {
    pub owner: String,
    pub name: String,
    pub object: ObjectRef,
    pub size: u64,
    pub content_hash: String,
    pub public: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub username: String,
    /// Bucket new uploads from this user are written to.
    pub bucket: String,
    pub max_rows: u32,
    pub created_at: OffsetDateTime,
}

fn timestamp(seconds: i64, field: &'static str) -> Result<OffsetDateTime, Error> {
    OffsetDateTime::from_unix_timestamp(seconds).or_raise(|| ErrorKind::InvalidData(field))
}

fn version_number(version: i64) -> Result<u32, Error> {
    u32::try_from(version).ok().filter(|v| *v >= 1).ok_or_else(|| Error::from(ErrorKind::InvalidData("version")))
}

#[derive(sqlx::FromRow)]
pub(crate) struct LocatedRow {
    pub(crate) bucket: String,
    pub(crate) object_id: String,
    pub(crate) version: i64,
}
impl TryFrom<LocatedRow> for LocatedVersion {
    type Error = Error;
    fn try_from(row: LocatedRow) -> Result<Self, Self::Error> {
        Ok(Self { object: ObjectRef::new(row.bucket, row.object_id), version: version_number(row.version)? })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct VersionRow {
    pub(crate) owner: String,
    pub(crate) name: String,
    pub(crate) version: i64,
    pub(crate) bucket: String,
    pub(crate) object_id: String,
    pub(crate) size: i64,
    pub(crate) content_hash: String,
    pub(crate) public: bool,
    pub(crate) created_at: i64,
}
impl TryFrom<VersionRow> for DatabaseVersion {
    type Error = Error;
    fn try_from(row: VersionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            owner: row.owner,
            name: row.name,
            version: version_number(row.version)?,
            object: ObjectRef::new(row.bucket, row.object_id),
            size: u64::try_from(row.size).or_raise(|| ErrorKind::InvalidData("size"))?,
            content_hash: row.content_hash,
            public: row.public,
            created_at: timestamp(row.created_at, "created at")?,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct UserRow {
    pub(crate) username: String,
    pub(crate) bucket: String,
    pub(crate) pref_max_rows: i64,
    pub(crate) created_at: i64,
}
impl TryFrom<UserRow> for User {
    type Error = Error;
    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            username: row.username,
            bucket: row.bucket,
            max_rows: u32::try_from(row.pref_max_rows).or_raise(|| ErrorKind::InvalidData("max rows"))?,
            created_at: timestamp(row.created_at, "created at")?,
        })
    }
}
