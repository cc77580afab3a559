//! Bucket and object id validation.
//!
//! Object ids become file paths on the local backend and keys on S3, so they
//! are held to the same rules as any other storage path: nothing that escapes
//! the bucket, no null bytes.

use std::path::{Component, Path};

use crate::error::{ErrorKind, Result};

/// Longest bucket name accepted by every supported backend.
const MAX_BUCKET_LEN: usize = 63;

/// Validates a bucket name.
///
/// Bucket names are a single path component made of ASCII alphanumerics,
/// `.`, `-` and `_`, at most 63 characters long.
///
/// # Examples
///
/// ```
/// use dbhub_storage::validate_bucket;
/// assert!(validate_bucket("alice").is_ok());
/// assert!(validate_bucket("user-data.eu_1").is_ok());
/// assert!(validate_bucket("").is_err());
/// assert!(validate_bucket("..").is_err());
/// assert!(validate_bucket("a/b").is_err());
/// ```
pub fn validate_bucket(bucket: &str) -> Result<&str> {
    let valid_chars = bucket.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));
    let dots_only = bucket.chars().all(|c| c == '.');
    if bucket.is_empty() || bucket.len() > MAX_BUCKET_LEN || !valid_chars || dots_only {
        exn::bail!(ErrorKind::InvalidBucket(bucket.to_string()));
    }
    Ok(bucket)
}

/// Validates an object id and returns its normalized form.
///
/// Ensures that ids don't escape the bucket (no `..` traversal), resolves
/// `.` and empty components, and always joins with `/` regardless of
/// platform.
///
/// # Examples
///
/// ```
/// use dbhub_storage::validate_object_id;
/// assert_eq!(validate_object_id("k3j9x0qa.db").unwrap(), "k3j9x0qa.db");
/// assert_eq!(validate_object_id("2024//./k3j9x0qa.db").unwrap(), "2024/k3j9x0qa.db");
/// assert!(validate_object_id("../other-bucket/secret.db").is_err());
/// assert!(validate_object_id("a\0b").is_err());
/// ```
pub fn validate_object_id(id: &str) -> Result<String> {
    let mut components: Vec<&str> = Vec::new();
    for component in Path::new(id).components() {
        match component {
            Component::Normal(s) => {
                // Null bytes pass through Path::components() on Unix but cause
                // truncation in C-based syscalls: reject them explicitly.
                let Some(s) = s.to_str().filter(|s| !s.contains('\0')) else {
                    exn::bail!(ErrorKind::InvalidObjectId(id.to_string()));
                };
                components.push(s)
            },
            Component::CurDir | Component::RootDir => {},
            Component::Prefix(_) => exn::bail!(ErrorKind::InvalidObjectId(id.to_string())),
            Component::ParentDir => {
                if components.pop().is_none() {
                    exn::bail!(ErrorKind::InvalidObjectId(id.to_string()));
                }
            },
        }
    }
    match components.is_empty() {
        true => exn::bail!(ErrorKind::InvalidObjectId(id.to_string())),
        false => Ok(components.join("/")),
    }
}
