//! S3-compatible storage backend.
//!
//! This module provides a storage backend implementation for S3-compatible
//! services including AWS S3, MinIO, Backblaze B2, Tigris, and others. The
//! bucket comes from each [`ObjectRef`], so one backend serves every user's
//! bucket on the same service.
//!
//! # Credentials
//!
//! Credentials are provided explicitly via the configuration file.

use crate::backend::BoxAsyncRead;
use crate::error::{ErrorKind, Result};
use crate::{ObjectRef, StorageBackend, validate_bucket, validate_object_id};
use async_trait::async_trait;
use aws_sdk_s3::{
    Client,
    config::{BehaviorVersion, Credentials, Region, retry::RetryConfig},
    error::{DisplayErrorContext, SdkError},
    primitives::ByteStream,
};
use exn::ResultExt;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Generous default for concurrent S3 requests.
const DEFAULT_CONCURRENT_REQUESTS: usize = 100;

/// S3-compatible storage backend.
///
/// # Examples
///
/// ```no_run
/// use dbhub_storage::backend::S3Backend;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = S3Backend::new(
///     "minio",
///     None,
///     "us-east-1",
///     Some("http://localhost:9000".to_string()),
///     "access_key_id",
///     "secret_access_key",
/// )?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct S3Backend {
    name: String,
    client: Client,
    prefix: Option<String>,
    /// Rate limiter for concurrent S3 requests.
    rate_limiter: Arc<Semaphore>,
}

impl S3Backend {
    /// Create a new S3 storage backend.
    ///
    /// # Arguments
    /// * `name` - A name for this backend (used in logging)
    /// * `prefix` - Optional key prefix applied inside every bucket
    /// * `region` - AWS region or provider-specific region
    /// * `endpoint` - Custom endpoint URL for S3-compatible services
    /// * `key_id` - Access key ID
    /// * `key_secret` - Secret access key
    pub fn new(
        name: impl Into<String>,
        prefix: Option<String>,
        region: impl Into<String>,
        endpoint: Option<impl Into<String>>,
        key_id: impl Into<String>,
        key_secret: impl Into<String>,
    ) -> Result<Self> {
        let prefix = prefix.map(|p| validate_object_id(&p)).transpose()?;
        let credentials = Credentials::new(key_id, key_secret, None, None, "dbhub-config");
        let mut config_builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new(region.into()))
            // Configure retry policy with exponential backoff (1 initial + 3 retries)
            .retry_config(RetryConfig::standard().with_max_attempts(4))
            // Use path-style addressing for better compatibility with
            // S3-compatible services (MinIO, Backblaze, etc.)
            .force_path_style(true);
        if let Some(endpoint_url) = endpoint {
            config_builder = config_builder.endpoint_url(endpoint_url);
        }
        Ok(Self::from_client(name, Client::from_conf(config_builder.build()), prefix))
    }

    /// Wrap an already-configured client.
    pub fn from_client(name: impl Into<String>, client: Client, prefix: Option<String>) -> Self {
        Self {
            name: name.into(),
            client,
            prefix,
            rate_limiter: Arc::new(Semaphore::new(DEFAULT_CONCURRENT_REQUESTS)),
        }
    }

    /// Validate the object and build the (bucket, key) pair for a request.
    fn locate(&self, object: &ObjectRef) -> Result<(String, String)> {
        let bucket = validate_bucket(&object.bucket)?.to_string();
        let id = validate_object_id(&object.id)?;
        let key = match &self.prefix {
            Some(prefix) => format!("{}/{}", prefix.trim_end_matches('/'), id),
            None => id,
        };
        Ok((bucket, key))
    }

    /// Acquire a rate limiter permit before making an S3 API call.
    async fn acquire_permit(&self) -> Result<OwnedSemaphorePermit> {
        self.rate_limiter
            .clone()
            .acquire_owned()
            .await
            .or_raise(|| ErrorKind::BackendError("S3 rate limiter closed".to_string()))
    }

    /// Transport failures are worth retrying; everything else the service
    /// told us is a backend error.
    fn map_sdk_error<E, R>(err: SdkError<E, R>) -> ErrorKind
    where
        E: std::error::Error + Send + Sync + 'static,
        R: std::fmt::Debug,
    {
        let message = DisplayErrorContext(&err).to_string();
        match err {
            SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) | SdkError::ResponseError(_) => {
                ErrorKind::Network(message)
            },
            _ => ErrorKind::BackendError(message),
        }
    }
}

#[async_trait]
impl StorageBackend for S3Backend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn exists(&self, object: &ObjectRef) -> Result<bool> {
        let (bucket, key) = self.locate(object)?;
        let _permit = self.acquire_permit().await?;
        match self.client.head_object().bucket(bucket).key(key).send().await {
            Ok(_) => Ok(true),
            Err(SdkError::ServiceError(e)) if e.err().is_not_found() => Ok(false),
            Err(e) => exn::bail!(Self::map_sdk_error(e)),
        }
    }

    async fn reader(&self, object: &ObjectRef) -> Result<BoxAsyncRead> {
        let (bucket, key) = self.locate(object)?;
        let _permit = self.acquire_permit().await?;
        let output = match self.client.get_object().bucket(bucket).key(key).send().await {
            Ok(output) => output,
            Err(SdkError::ServiceError(e)) if e.err().is_no_such_key() => {
                exn::bail!(ErrorKind::NotFound(object.to_string()))
            },
            Err(e) => exn::bail!(Self::map_sdk_error(e)),
        };
        tracing::debug!(backend = %self.name, object = %object, size = ?output.content_length(), "Opened S3 object stream");
        Ok(Box::pin(output.body.into_async_read()))
    }

    async fn write(&self, object: &ObjectRef, data: &[u8]) -> Result<()> {
        let (bucket, key) = self.locate(object)?;
        let _permit = self.acquire_permit().await?;
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type("application/x-sqlite3")
            .body(ByteStream::from(data.to_vec()))
            .send()
            .await
            .map_err(Self::map_sdk_error)?;
        Ok(())
    }

    async fn delete(&self, object: &ObjectRef) -> Result<()> {
        // S3 deletes are idempotent; check first to keep NotFound semantics
        // consistent with the other backends.
        if !self.exists(object).await? {
            exn::bail!(ErrorKind::NotFound(object.to_string()));
        }
        let (bucket, key) = self.locate(object)?;
        let _permit = self.acquire_permit().await?;
        self.client.delete_object().bucket(bucket).key(key).send().await.map_err(Self::map_sdk_error)?;
        Ok(())
    }
}
