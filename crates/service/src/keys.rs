//! Cache key derivation.
//!
//! Keys are a readable namespace or prefix followed by the BLAKE3 hex digest
//! of every input that can change the cached value. Each input is
//! length-prefixed before hashing, so `("ab", "c")` and `("a", "bc")` never
//! share a digest.

use crate::access::{Actor, DatabaseRef};
use dbhub_extract::Filter;
use dbhub_metastore::{QueryTemplate, Visibility};

/// Namespace shared by every non-owner request.
pub const PUBLIC_NAMESPACE: &str = "pub/";

/// Which rendered output an output-tier entry holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    /// Pretty-printed JSON of a full scan.
    Table,
    /// Compact JSON of a projected, possibly filtered, scan.
    Vis,
}

impl ViewKind {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Vis => "vis",
        }
    }

    fn prefix(&self, visibility: Visibility) -> &'static str {
        match (self, visibility) {
            (Self::Table, Visibility::Owner) => "tbl-",
            (Self::Table, Visibility::Public) => "tbl-pub-",
            (Self::Vis, Visibility::Owner) => "visdat-",
            (Self::Vis, Visibility::Public) => "visdat-pub-",
        }
    }
}

/// Request parameters that shape an output entry beyond which database and
/// table it came from.
#[derive(Debug, Clone, Copy)]
pub struct OutputParams<'a> {
    pub kind: ViewKind,
    pub x: Option<&'a str>,
    pub y: Option<&'a str>,
    pub filter: Option<&'a Filter>,
    /// The row limit actually applied, after preferences and caps.
    pub max_rows: u32,
}

impl OutputParams<'_> {
    pub fn table(max_rows: u32) -> Self {
        Self { kind: ViewKind::Table, x: None, y: None, filter: None, max_rows }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKeys {
    pub metadata: String,
    pub output: String,
}

#[derive(Default)]
struct Fingerprint(blake3::Hasher);

impl Fingerprint {
    fn field(mut self, value: &str) -> Self {
        self.0.update(&(value.len() as u64).to_le_bytes());
        self.0.update(value.as_bytes());
        self
    }

    fn hex(&self) -> String {
        self.0.finalize().to_hex().to_string()
    }
}

fn namespace(actor: &Actor, template: &QueryTemplate) -> String {
    match template.visibility {
        Visibility::Owner => format!("{actor}/"),
        Visibility::Public => PUBLIC_NAMESPACE.to_string(),
    }
}

fn version_field(template: &QueryTemplate) -> String {
    template.version.map(|v| v.to_string()).unwrap_or_default()
}

/// Key for the resolved object location of `database` under `template`.
pub fn metadata_key(actor: &Actor, database: &DatabaseRef, template: &QueryTemplate) -> String {
    let digest = Fingerprint::default()
        .field(template.sql())
        .field(database.owner())
        .field(database.name())
        .field(&version_field(template))
        .hex();
    format!("{}{digest}", namespace(actor, template))
}

/// Key for a rendered response.
pub fn output_key(
    actor: &Actor,
    database: &DatabaseRef,
    table: &str,
    template: &QueryTemplate,
    params: &OutputParams<'_>,
) -> String {
    let (column, operator, value) = match params.filter {
        Some(filter) => (filter.column.as_str(), filter.operator.as_sql(), filter.value.as_str()),
        None => ("", "", ""),
    };
    let digest = Fingerprint::default()
        .field(&namespace(actor, template))
        .field(database.owner())
        .field(database.name())
        .field(table)
        .field(params.kind.as_str())
        .field(params.x.unwrap_or_default())
        .field(params.y.unwrap_or_default())
        .field(column)
        .field(operator)
        .field(value)
        .field(&params.max_rows.to_string())
        .field(&version_field(template))
        .hex();
    format!("{}{digest}", params.kind.prefix(template.visibility))
}

pub fn derive_keys(
    actor: &Actor,
    database: &DatabaseRef,
    table: &str,
    template: &QueryTemplate,
    params: &OutputParams<'_>,
) -> CacheKeys {
    CacheKeys {
        metadata: metadata_key(actor, database, template),
        output: output_key(actor, database, table, template, params),
    }
}
