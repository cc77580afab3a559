//! Who is asking, for what, and which version they may see.

use crate::error::{ErrorKind, Result};
use dbhub_metastore::{QueryTemplate, Visibility};
use std::fmt;
use std::str::FromStr;

/// Longest owner or database name accepted.
const MAX_NAME_LEN: usize = 256;

/// The already-authenticated identity making a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Actor {
    Anonymous,
    User(String),
}

impl Actor {
    /// An empty username is anonymous.
    pub fn new(username: impl Into<String>) -> Self {
        let username = username.into();
        if username.is_empty() { Self::Anonymous } else { Self::User(username) }
    }

    pub fn username(&self) -> Option<&str> {
        match self {
            Self::Anonymous => None,
            Self::User(name) => Some(name),
        }
    }

    pub fn is(&self, owner: &str) -> bool {
        self.username() == Some(owner)
    }
}

impl From<Option<String>> for Actor {
    fn from(username: Option<String>) -> Self {
        username.map_or(Self::Anonymous, Self::new)
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous => f.write_str("-"),
            Self::User(name) => f.write_str(name),
        }
    }
}

/// An owner and database name pair that passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DatabaseRef {
    owner: String,
    name: String,
}

impl DatabaseRef {
    pub fn new(owner: &str, name: &str) -> Result<Self> {
        validate_name("owner", owner)?;
        validate_name("database", name)?;
        Ok(Self { owner: owner.to_string(), name: name.to_string() })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Parses `<owner>/<database>`.
impl FromStr for DatabaseRef {
    type Err = crate::error::Error;
    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('/') {
            Some((owner, name)) => Self::new(owner, name),
            None => exn::bail!(ErrorKind::InvalidInput("Expected <owner>/<database>".to_string())),
        }
    }
}

impl fmt::Display for DatabaseRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

fn validate_name(what: &str, name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && !name.chars().any(|c| c.is_control() || matches!(c, '/' | '\\'));
    if !valid {
        exn::bail!(ErrorKind::InvalidInput(format!("Invalid {what} name")));
    }
    Ok(())
}

/// Choose the version-selection rule for a request.
///
/// The owner sees their newest version whatever its visibility; everyone
/// else only sees public versions. `version` pins an exact version under
/// the same rule.
pub fn resolve(actor: &Actor, database: &DatabaseRef, version: Option<u32>) -> QueryTemplate {
    let visibility = if actor.is(database.owner()) { Visibility::Owner } else { Visibility::Public };
    match version {
        Some(version) => QueryTemplate::exact(visibility, version),
        None => QueryTemplate::latest(visibility),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn db(owner: &str, name: &str) -> DatabaseRef {
        DatabaseRef::new(owner, name).unwrap()
    }

    #[rstest]
    #[case::owner(Actor::new("alice"), Visibility::Owner)]
    #[case::other_user(Actor::new("bob"), Visibility::Public)]
    #[case::anonymous(Actor::Anonymous, Visibility::Public)]
    #[case::empty_username(Actor::new(""), Visibility::Public)]
    #[case::case_differs(Actor::new("Alice"), Visibility::Public)]
    fn test_resolve_visibility(#[case] actor: Actor, #[case] expected: Visibility) {
        let template = resolve(&actor, &db("alice", "sales.db"), None);
        assert_eq!(template, QueryTemplate::latest(expected));
    }

    #[test]
    fn test_resolve_exact_version() {
        let template = resolve(&Actor::new("bob"), &db("alice", "sales.db"), Some(3));
        assert_eq!(template, QueryTemplate::exact(Visibility::Public, 3));
    }

    #[test]
    fn test_actor_from_option() {
        assert_eq!(Actor::from(None), Actor::Anonymous);
        assert_eq!(Actor::from(Some(String::new())), Actor::Anonymous);
        assert_eq!(Actor::from(Some("alice".to_string())).username(), Some("alice"));
        assert_eq!(Actor::Anonymous.to_string(), "-");
    }

    #[test]
    fn test_parse_database_ref() {
        let parsed: DatabaseRef = "alice/sales 2024.db".parse().unwrap();
        assert_eq!(parsed.owner(), "alice");
        assert_eq!(parsed.name(), "sales 2024.db");
        assert_eq!(parsed.to_string(), "alice/sales 2024.db");
    }

    #[rstest]
    #[case::no_separator("alice")]
    #[case::empty_owner("/sales.db")]
    #[case::empty_name("alice/")]
    #[case::nested("alice/sub/sales.db")]
    #[case::control("alice/sa\nles.db")]
    #[case::backslash("alice/..\\sales.db")]
    fn test_invalid_database_ref(#[case] input: &str) {
        let err = input.parse::<DatabaseRef>().unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidInput(_)));
    }

    #[test]
    fn test_name_length() {
        assert!(DatabaseRef::new("alice", &"a".repeat(MAX_NAME_LEN)).is_ok());
        assert!(DatabaseRef::new("alice", &"a".repeat(MAX_NAME_LEN + 1)).is_err());
    }
}
