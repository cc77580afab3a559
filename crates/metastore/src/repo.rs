//! Repository for databases, their versions and users.

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::{
    DatabaseVersion, LocatedRow, LocatedVersion, NewVersion, QueryTemplate, User, UserRow, VersionRow,
};
use exn::ResultExt;
use sqlx::SqlitePool;
use time::OffsetDateTime;
use tracing::instrument;

/// Row limit for table views when the actor is anonymous or has no stored
/// preference.
pub const DEFAULT_MAX_ROWS: u32 = 10;
const MAX_ROWS_RANGE: std::ops::RangeInclusive<u32> = 1..=500;

/// Queries against the metadata store.
///
/// Version rows are never updated: [`record_version`](Self::record_version)
/// always inserts a new row with the next number for that database.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}
impl From<&Database> for Repository {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}
impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Versions
    // =========================================================================

    /// Resolve the storage location of a database version.
    ///
    /// Returns `None` when nothing matches, whether the database is absent or
    /// simply has no version visible under the template.
    #[instrument(level = "debug", skip(self), fields(template = %template))]
    pub async fn locate(&self, owner: &str, name: &str, template: QueryTemplate) -> Result<Option<LocatedVersion>> {
        let mut query = sqlx::query_as::<_, LocatedRow>(template.sql()).bind(owner).bind(name);
        if let Some(version) = template.version {
            query = query.bind(version);
        }
        let row = query.fetch_optional(&self.pool).await.or_raise(|| ErrorKind::Database)?;
        row.map(LocatedVersion::try_from).transpose()
    }

    /// Record a stored upload as the next version of its database.
    ///
    /// The database identity is created on first upload. Numbering and the
    /// insert happen in one transaction.
    #[instrument(level = "debug", skip(self, new), fields(owner = %new.owner, name = %new.name))]
    pub async fn record_version(&self, new: &NewVersion) -> Result<DatabaseVersion> {
        let size = i64::try_from(new.size).or_raise(|| ErrorKind::InvalidData("size"))?;
        let now = OffsetDateTime::now_utc().replace_nanosecond(0).or_raise(|| ErrorKind::InvalidData("created at"))?;
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        let (db_id,): (i64,) = sqlx::query_as(include_str!("../queries/upsert_database.sql"))
            .bind(&new.owner)
            .bind(&new.name)
            .bind(now.unix_timestamp())
            .fetch_one(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let (version,): (i64,) = sqlx::query_as(include_str!("../queries/insert_version.sql"))
            .bind(db_id)
            .bind(&new.object.bucket)
            .bind(&new.object.id)
            .bind(size)
            .bind(&new.content_hash)
            .bind(new.public)
            .bind(now.unix_timestamp())
            .fetch_one(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        let version = u32::try_from(version).or_raise(|| ErrorKind::InvalidData("version"))?;
        tracing::info!(owner = %new.owner, name = %new.name, version, public = new.public, "Recorded database version");
        Ok(DatabaseVersion {
            owner: new.owner.clone(),
            name: new.name.clone(),
            version,
            object: new.object.clone(),
            size: new.size,
            content_hash: new.content_hash.clone(),
            public: new.public,
            created_at: now,
        })
    }

    /// Every version of a database, oldest first, regardless of visibility.
    pub async fn list_versions(&self, owner: &str, name: &str) -> Result<Vec<DatabaseVersion>> {
        let rows: Vec<VersionRow> = sqlx::query_as(include_str!("../queries/list_versions.sql"))
            .bind(owner)
            .bind(name)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(DatabaseVersion::try_from).collect()
    }

    // =========================================================================
    // Users
    // =========================================================================

    pub async fn create_user(&self, username: &str, bucket: &str) -> Result<User> {
        let now = OffsetDateTime::now_utc().replace_nanosecond(0).or_raise(|| ErrorKind::InvalidData("created at"))?;
        let result = sqlx::query(include_str!("../queries/insert_user.sql"))
            .bind(username)
            .bind(bucket)
            .bind(now.unix_timestamp())
            .execute(&self.pool)
            .await;
        match result {
            Ok(_) => {},
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                exn::bail!(ErrorKind::UserExists(username.to_string()))
            },
            Err(e) => return Err(e).or_raise(|| ErrorKind::Database),
        }
        Ok(User { username: username.to_string(), bucket: bucket.to_string(), max_rows: DEFAULT_MAX_ROWS, created_at: now })
    }

    pub async fn get_user(&self, username: &str) -> Result<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(include_str!("../queries/get_user.sql"))
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(User::try_from).transpose()
    }

    /// Row limit for a user's table views. Unknown users get
    /// [`DEFAULT_MAX_ROWS`].
    pub async fn max_rows_preference(&self, username: &str) -> Result<u32> {
        Ok(self.get_user(username).await?.map_or(DEFAULT_MAX_ROWS, |user| user.max_rows))
    }

    pub async fn set_max_rows_preference(&self, username: &str, max_rows: u32) -> Result<()> {
        if !MAX_ROWS_RANGE.contains(&max_rows) {
            exn::bail!(ErrorKind::InvalidPreference(max_rows));
        }
        let result = sqlx::query(include_str!("../queries/set_max_rows.sql"))
            .bind(max_rows)
            .bind(username)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        if result.rows_affected() == 0 {
            exn::bail!(ErrorKind::UserNotFound(username.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Visibility;
    use dbhub_storage::ObjectRef;
    use rstest::rstest;

    async fn repo() -> Repository {
        let db = Database::connect_in_memory().await.unwrap();
        Repository::from(&db)
    }

    fn upload(owner: &str, name: &str, id: &str, public: bool) -> NewVersion {
        NewVersion {
            owner: owner.to_string(),
            name: name.to_string(),
            object: ObjectRef::new(owner, id),
            size: 4096,
            content_hash: blake3_like(id),
            public,
        }
    }

    fn blake3_like(seed: &str) -> String {
        format!("{seed:0>64}")
    }

    #[tokio::test]
    async fn test_versions_are_numbered_per_database() {
        let repo = repo().await;
        let v1 = repo.record_version(&upload("alice", "sales.db", "a1.db", false)).await.unwrap();
        let v2 = repo.record_version(&upload("alice", "sales.db", "a2.db", true)).await.unwrap();
        let other = repo.record_version(&upload("alice", "stock.db", "b1.db", true)).await.unwrap();
        assert_eq!((v1.version, v2.version, other.version), (1, 2, 1));
    }

    #[tokio::test]
    async fn test_recording_leaves_older_versions_untouched() {
        let repo = repo().await;
        let v1 = repo.record_version(&upload("alice", "sales.db", "a1.db", false)).await.unwrap();
        repo.record_version(&upload("alice", "sales.db", "a2.db", true)).await.unwrap();
        let versions = repo.list_versions("alice", "sales.db").await.unwrap();
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0], v1);
        assert_eq!(versions[1].version, 2);
    }

    #[tokio::test]
    async fn test_version_rows_cannot_be_updated() {
        let repo = repo().await;
        repo.record_version(&upload("alice", "sales.db", "a1.db", false)).await.unwrap();
        let result = sqlx::query("UPDATE database_versions SET public = 1").execute(&repo.pool).await;
        assert!(result.is_err());
    }

    #[rstest]
    #[case::owner_sees_latest_private(Visibility::Owner, None, Some(("a3.db", 3)))]
    #[case::public_sees_latest_public(Visibility::Public, None, Some(("a2.db", 2)))]
    #[case::owner_exact_private(Visibility::Owner, Some(1), Some(("a1.db", 1)))]
    #[case::public_exact_private_is_hidden(Visibility::Public, Some(1), None)]
    #[case::public_exact_public(Visibility::Public, Some(2), Some(("a2.db", 2)))]
    #[case::missing_version(Visibility::Owner, Some(9), None)]
    #[tokio::test]
    async fn test_locate(
        #[case] visibility: Visibility,
        #[case] version: Option<u32>,
        #[case] expected: Option<(&str, u32)>,
    ) {
        let repo = repo().await;
        repo.record_version(&upload("alice", "sales.db", "a1.db", false)).await.unwrap();
        repo.record_version(&upload("alice", "sales.db", "a2.db", true)).await.unwrap();
        repo.record_version(&upload("alice", "sales.db", "a3.db", false)).await.unwrap();
        let template = QueryTemplate { visibility, version };
        let located = repo.locate("alice", "sales.db", template).await.unwrap();
        let expected = expected.map(|(id, version)| LocatedVersion { object: ObjectRef::new("alice", id), version });
        assert_eq!(located, expected);
    }

    #[tokio::test]
    async fn test_locate_private_only_database_is_hidden_from_public() {
        let repo = repo().await;
        repo.record_version(&upload("alice", "secret.db", "s1.db", false)).await.unwrap();
        let public = repo.locate("alice", "secret.db", QueryTemplate::latest(Visibility::Public)).await.unwrap();
        let absent = repo.locate("alice", "nothing.db", QueryTemplate::latest(Visibility::Public)).await.unwrap();
        assert_eq!(public, None);
        assert_eq!(absent, None);
    }

    #[tokio::test]
    async fn test_locate_does_not_cross_owners() {
        let repo = repo().await;
        repo.record_version(&upload("alice", "sales.db", "a1.db", true)).await.unwrap();
        let located = repo.locate("bob", "sales.db", QueryTemplate::latest(Visibility::Owner)).await.unwrap();
        assert_eq!(located, None);
    }

    #[tokio::test]
    async fn test_max_rows_preference() {
        let repo = repo().await;
        assert_eq!(repo.max_rows_preference("nobody").await.unwrap(), DEFAULT_MAX_ROWS);
        repo.create_user("alice", "alice-bucket").await.unwrap();
        assert_eq!(repo.max_rows_preference("alice").await.unwrap(), DEFAULT_MAX_ROWS);
        repo.set_max_rows_preference("alice", 250).await.unwrap();
        assert_eq!(repo.max_rows_preference("alice").await.unwrap(), 250);
    }

    #[rstest]
    #[case(0)]
    #[case(501)]
    #[tokio::test]
    async fn test_max_rows_preference_is_validated(#[case] max_rows: u32) {
        let repo = repo().await;
        repo.create_user("alice", "alice-bucket").await.unwrap();
        let err = repo.set_max_rows_preference("alice", max_rows).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidPreference(n) if *n == max_rows));
    }

    #[tokio::test]
    async fn test_preference_for_unknown_user() {
        let repo = repo().await;
        let err = repo.set_max_rows_preference("ghost", 20).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::UserNotFound(_)));
    }

    #[tokio::test]
    async fn test_duplicate_user() {
        let repo = repo().await;
        repo.create_user("alice", "alice-bucket").await.unwrap();
        let err = repo.create_user("alice", "other").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::UserExists(_)));
        let user = repo.get_user("alice").await.unwrap().unwrap();
        assert_eq!(user.bucket, "alice-bucket");
    }
}
