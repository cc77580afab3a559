//! Validated identifiers, filters and the statements built from them.
//!
//! Only three things are ever interpolated into SQL text: a [`Table`] taken
//! from the live listing, column [`Identifier`]s that passed validation, and
//! an [`Operator`] from a fixed set. Filter values are always bound.

use crate::consts::{IDENTIFIER_REGEX, MAX_IDENTIFIER_LEN, SQLITE_KEYWORDS};
use crate::error::{Error, ErrorKind, Result};
use crate::schema::Table;
use std::fmt;
use std::str::FromStr;

/// Wrap a name in double quotes, doubling any embedded quote.
pub(crate) fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// A column name that is safe to interpolate.
///
/// ASCII letters, digits and underscores, not starting with a digit, at most
/// 63 characters, and not an SQLite keyword (case-insensitive).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(String);

impl Identifier {
    pub fn parse(name: &str) -> Result<Self> {
        let valid = name.len() <= MAX_IDENTIFIER_LEN
            && IDENTIFIER_REGEX.is_match(name)
            && SQLITE_KEYWORDS.binary_search(&name.to_ascii_uppercase().as_str()).is_err();
        if !valid {
            exn::bail!(ErrorKind::InvalidIdentifier(name.to_string()));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn quoted(&self) -> String {
        quote_identifier(&self.0)
    }
}

impl FromStr for Identifier {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Comparison operators a filter may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Like,
}

impl Operator {
    pub const ALL: [Self; 7] = [Self::Eq, Self::NotEq, Self::Lt, Self::LtEq, Self::Gt, Self::GtEq, Self::Like];

    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::Like => "LIKE",
        }
    }
}

impl FromStr for Operator {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_sql() == s)
            .ok_or_else(|| Error::from(ErrorKind::InvalidOperator(s.to_string())))
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// A single `<column> <operator> ?` condition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Filter {
    pub column: Identifier,
    pub operator: Operator,
    /// Bound as text; SQLite applies the column's affinity when comparing.
    pub value: String,
}

impl Filter {
    pub fn new(column: &str, operator: &str, value: impl Into<String>) -> Result<Self> {
        Ok(Self { column: column.parse()?, operator: operator.parse()?, value: value.into() })
    }

    /// Build an optional filter from request parameters.
    ///
    /// Empty strings count as absent. Either all three parts are present, or
    /// none are.
    pub fn from_parts(column: Option<&str>, operator: Option<&str>, value: Option<&str>) -> Result<Option<Self>> {
        fn present(part: Option<&str>) -> Option<&str> {
            part.filter(|s| !s.is_empty())
        }
        match (present(column), present(operator), present(value)) {
            (None, None, None) => Ok(None),
            (Some(column), Some(operator), Some(value)) => Self::new(column, operator, value).map(Some),
            _ => exn::bail!(ErrorKind::IncompleteFilter),
        }
    }
}

/// `SELECT * FROM <table> LIMIT ?`
pub(crate) fn select_all(table: &Table) -> String {
    format!("SELECT * FROM {} LIMIT ?", table.quoted())
}

/// `SELECT <x>, <y> FROM <table> [WHERE <column> <op> ?] LIMIT ?`
pub(crate) fn select_projected(table: &Table, x: &Identifier, y: &Identifier, filter: Option<&Filter>) -> String {
    let mut sql = format!("SELECT {}, {} FROM {}", x.quoted(), y.quoted(), table.quoted());
    if let Some(filter) = filter {
        sql.push_str(&format!(" WHERE {} {} ?", filter.column.quoted(), filter.operator.as_sql()));
    }
    sql.push_str(" LIMIT ?");
    sql
}

/// `SELECT count(*) FROM <table>`
pub(crate) fn count(table: &Table) -> String {
    format!("SELECT count(*) FROM {}", table.quoted())
}
