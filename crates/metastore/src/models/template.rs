//! Version-selection query shapes.
//!
//! A template only selects *which* SQL text runs. Owner and database names,
//! and an explicit version number, are always bound parameters.

use std::fmt;

/// Which rows a caller is allowed to see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Visibility {
    /// The caller owns the database: every version is visible.
    Owner,
    /// Anyone else: only versions flagged public.
    Public,
}

/// Version-selection rule for one lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryTemplate {
    pub visibility: Visibility,
    /// `None` selects the highest visible version.
    pub version: Option<u32>,
}

impl QueryTemplate {
    pub fn latest(visibility: Visibility) -> Self {
        Self { visibility, version: None }
    }

    pub fn exact(visibility: Visibility, version: u32) -> Self {
        Self { visibility, version: Some(version) }
    }

    /// The SQL text this template runs.
    ///
    /// Parameters are `?1` owner, `?2` database name and, for exact lookups,
    /// `?3` version.
    pub fn sql(&self) -> &'static str {
        match (self.visibility, self.version) {
            (Visibility::Owner, None) => include_str!("../../queries/locate_latest_owner.sql"),
            (Visibility::Public, None) => include_str!("../../queries/locate_latest_public.sql"),
            (Visibility::Owner, Some(_)) => include_str!("../../queries/locate_version_owner.sql"),
            (Visibility::Public, Some(_)) => include_str!("../../queries/locate_version_public.sql"),
        }
    }
}

impl fmt::Display for QueryTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let visibility = match self.visibility {
            Visibility::Owner => "owner",
            Visibility::Public => "public",
        };
        match self.version {
            Some(version) => write!(f, "{visibility}@{version}"),
            None => write!(f, "{visibility}@latest"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_shape_has_distinct_sql() {
        let shapes = [
            QueryTemplate::latest(Visibility::Owner),
            QueryTemplate::latest(Visibility::Public),
            QueryTemplate::exact(Visibility::Owner, 1),
            QueryTemplate::exact(Visibility::Public, 1),
        ];
        for (i, a) in shapes.iter().enumerate() {
            for b in &shapes[i + 1..] {
                assert_ne!(a.sql(), b.sql(), "{a} and {b} share SQL");
            }
        }
    }

    #[test]
    fn test_latest_uses_aggregate() {
        for visibility in [Visibility::Owner, Visibility::Public] {
            let sql = QueryTemplate::latest(visibility).sql();
            assert!(sql.contains("MAX("));
            assert!(!sql.contains("ORDER BY"));
        }
    }

    #[test]
    fn test_public_shapes_filter_on_flag() {
        assert!(QueryTemplate::latest(Visibility::Public).sql().contains("public = 1"));
        assert!(QueryTemplate::exact(Visibility::Public, 3).sql().contains("public = 1"));
        assert!(!QueryTemplate::latest(Visibility::Owner).sql().contains("public = 1"));
    }

    #[test]
    fn test_display() {
        assert_eq!(QueryTemplate::latest(Visibility::Owner).to_string(), "owner@latest");
        assert_eq!(QueryTemplate::exact(Visibility::Public, 4).to_string(), "public@4");
    }
}
