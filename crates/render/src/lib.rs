//! Response assembly: JSON record sets, CSV attachments, raw passthrough
//! and error pages.

mod delimited;
pub mod error;
mod json;
mod page;
mod response;

pub use crate::delimited::to_csv;
pub use crate::json::{Layout, to_json};
pub use crate::page::{ErrorPage, INTERNAL_MESSAGE, NOT_FOUND_MESSAGE};
pub use crate::response::{
    Body, BoxReader, CONTENT_TYPE_CSV, CONTENT_TYPE_JSON, CONTENT_TYPE_SQLITE, CONTENT_TYPE_TEXT, Delivery, Response,
    escape_filename,
};
