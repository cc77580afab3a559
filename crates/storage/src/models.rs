//! Storage models.
//!
//! These types identify stored database blobs, as recorded by the metadata
//! store and cached by the pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Location of a stored object: the bucket it lives in and its id within it.
///
/// This is the pair resolved by the metadata store for a database version,
/// and the value cached in the metadata tier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    pub bucket: String,
    pub id: String,
}
impl ObjectRef {
    pub fn new(bucket: impl Into<String>, id: impl Into<String>) -> Self {
        Self { bucket: bucket.into(), id: id.into() }
    }
}
impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.id)
    }
}

