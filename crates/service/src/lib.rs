//! Content resolution and caching pipeline.
//!
//! A request names an actor, an `<owner>/<database>` pair and what to read
//! from it. The [`Service`] decides which version the actor may see, answers
//! from the cache when it can, and otherwise copies the stored database to a
//! temporary file, extracts typed rows from it and renders the response.
//!
//! ```text
//! access::resolve ─► keys ─► cache ──hit──► Response
//!                              │miss
//!                              ▼
//!                   materialize ─► schema ─► rows ─► render ─► cache
//! ```

pub mod access;
pub mod error;
pub mod keys;
mod materialize;
mod service;

pub use crate::access::{Actor, DatabaseRef};
pub use crate::error::error_response;
pub use crate::materialize::materialize;
pub use crate::service::{CsvRequest, DownloadRequest, Service, Settings, TableRequest, VisRequest};
