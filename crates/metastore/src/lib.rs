//! Relational metadata store for uploaded databases.
//!
//! The store records which databases exist, the immutable versions uploaded
//! for each one, and the small amount of per-user state the read path needs.
//! It is the source of truth for *where* a database version lives in object
//! storage; the bytes themselves live in a [`dbhub_storage`] backend.
//!
//! # Architecture
//! - **Databases**: one row per `(owner, name)` identity.
//! - **Versions**: write-once rows numbered from 1 per database. The current
//!   version is always resolved with an explicit `MAX(version)` aggregate,
//!   optionally restricted to public rows (see [`QueryTemplate`]).
//! - **Users**: username, default bucket and the max-rows preference.

mod db;
pub mod error;
mod models;
mod repo;

pub use crate::db::Database;
pub use crate::models::{DatabaseVersion, LocatedVersion, NewVersion, QueryTemplate, User, Visibility};
pub use crate::repo::{DEFAULT_MAX_ROWS, Repository};
