//! Layered configuration.
//!
//! Sources, lowest priority first:
//! 1. built-in defaults,
//! 2. an optional config file (TOML, YAML or JSON, chosen by extension),
//! 3. environment variables prefixed `DBHUB_`, with `__` separating nested
//!    keys (`DBHUB_CACHE__OUTPUT_TTL=60`).

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::instrument;

pub const ENV_PREFIX: &str = "DBHUB_";
const MAX_ROWS_LIMIT: u32 = 500;

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "dbhub")
}

fn data_dir() -> PathBuf {
    project_dirs().map_or_else(|| std::env::temp_dir().join("dbhub"), |dirs| dirs.data_dir().to_path_buf())
}

/// `config.toml` in the platform config directory, if there is one.
pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub metadata: MetadataConfig,
    pub storage: StorageConfig,
    pub cache: CacheConfig,
    pub limits: Limits,
    /// Where databases are materialised; the system temp dir if unset.
    pub temp_dir: Option<PathBuf>,
    /// Fallback log filter when `RUST_LOG` isn't set.
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        let data = data_dir();
        Self {
            metadata: MetadataConfig { path: data.join("metadata.sqlite") },
            storage: StorageConfig::Local { root: data.join("objects") },
            cache: CacheConfig::default(),
            limits: Limits::default(),
            temp_dir: None,
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    Local {
        root: PathBuf,
    },
    S3 {
        region: String,
        #[serde(default)]
        endpoint: Option<String>,
        key_id: String,
        key_secret: String,
        /// Key prefix applied inside every bucket.
        #[serde(default)]
        prefix: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CacheBackend {
    Memory,
    Sqlite { path: PathBuf },
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    /// Seconds a resolved object location stays cached.
    pub metadata_ttl: u64,
    /// Seconds a rendered response stays cached.
    pub output_ttl: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { backend: CacheBackend::Memory, metadata_ttl: 120, output_ttl: 1800 }
    }
}

impl CacheConfig {
    pub fn metadata_ttl(&self) -> Duration {
        Duration::from_secs(self.metadata_ttl)
    }

    pub fn output_ttl(&self) -> Duration {
        Duration::from_secs(self.output_ttl)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    /// Table view row limit for anonymous actors and users without a
    /// preference.
    pub default_max_rows: u32,
    /// Row limit for visualisation data.
    pub visualisation_max_values: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self { default_max_rows: 10, visualisation_max_values: 2500 }
    }
}

impl Config {
    /// Load configuration from defaults, `path` (or the default config path)
    /// and the environment.
    ///
    /// An explicit `path` must exist. The default path is skipped when
    /// missing.
    #[instrument(level = "debug")]
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        match path {
            Some(path) if !path.is_file() => exn::bail!(ErrorKind::NotFound(path.to_path_buf())),
            Some(path) => figment = Self::merge_file(figment, path)?,
            None => {
                if let Some(path) = default_config_path().filter(|p| p.is_file()) {
                    figment = Self::merge_file(figment, &path)?;
                }
            },
        }
        Self::extract(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    fn merge_file(figment: Figment, path: &Path) -> Result<Figment> {
        tracing::debug!(path = %path.display(), "Reading config file");
        let extension = path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
        Ok(match extension.as_deref() {
            Some("toml") => figment.merge(Toml::file_exact(path)),
            Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path)),
            Some("json") => figment.merge(Json::file_exact(path)),
            _ => exn::bail!(ErrorKind::UnsupportedFormat(path.to_path_buf())),
        })
    }

    fn extract(figment: Figment) -> Result<Self> {
        let config: Self = figment.extract().map_err(|e| ErrorKind::Invalid(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_ROWS_LIMIT).contains(&self.limits.default_max_rows) {
            exn::bail!(ErrorKind::Validation {
                field: "limits.default_max_rows",
                reason: format!("must be between 1 and {MAX_ROWS_LIMIT}"),
            });
        }
        if self.limits.visualisation_max_values == 0 {
            exn::bail!(ErrorKind::Validation {
                field: "limits.visualisation_max_values",
                reason: "must be at least 1".to_string(),
            });
        }
        if let StorageConfig::Local { root } = &self.storage
            && !root.is_absolute()
        {
            exn::bail!(ErrorKind::Validation {
                field: "storage.root",
                reason: format!("must be an absolute path, got {}", root.display()),
            });
        }
        if let StorageConfig::S3 { region, .. } = &self.storage
            && region.is_empty()
        {
            exn::bail!(ErrorKind::Validation { field: "storage.region", reason: "must not be empty".to_string() });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use rstest::rstest;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.cache.metadata_ttl(), Duration::from_secs(120));
        assert_eq!(config.cache.output_ttl(), Duration::from_secs(1800));
        assert_eq!(config.limits, Limits { default_max_rows: 10, visualisation_max_values: 2500 });
        assert_eq!(config.cache.backend, CacheBackend::Memory);
        config.validate().unwrap();
    }

    #[test]
    fn test_file_then_env() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "dbhub.toml",
                r#"
                    log_level = "debug"

                    [storage]
                    type = "s3"
                    region = "eu-west-1"
                    key_id = "id"
                    key_secret = "secret"

                    [cache]
                    output_ttl = 60

                    [cache.backend]
                    type = "sqlite"
                    path = "/var/cache/dbhub.sqlite"
                "#,
            )?;
            jail.set_env("DBHUB_CACHE__OUTPUT_TTL", "30");
            jail.set_env("DBHUB_LIMITS__DEFAULT_MAX_ROWS", "25");
            let config = Config::load(Some(Path::new("dbhub.toml"))).map_err(|e| e.to_string())?;
            assert_eq!(config.log_level, "debug");
            assert!(matches!(&config.storage, StorageConfig::S3 { region, endpoint: None, .. } if region == "eu-west-1"));
            assert_eq!(config.cache.backend, CacheBackend::Sqlite { path: "/var/cache/dbhub.sqlite".into() });
            // Environment wins over the file; untouched values keep their defaults
            assert_eq!(config.cache.output_ttl, 30);
            assert_eq!(config.cache.metadata_ttl, 120);
            assert_eq!(config.limits.default_max_rows, 25);
            Ok(())
        });
    }

    #[test]
    fn test_yaml_and_json() {
        Jail::expect_with(|jail| {
            jail.create_file("dbhub.yaml", "cache:\n  backend:\n    type: disabled\n")?;
            jail.create_file("dbhub.json", r#"{"limits": {"visualisation_max_values": 100}}"#)?;
            let yaml = Config::load(Some(Path::new("dbhub.yaml"))).map_err(|e| e.to_string())?;
            assert_eq!(yaml.cache.backend, CacheBackend::Disabled);
            let json = Config::load(Some(Path::new("dbhub.json"))).map_err(|e| e.to_string())?;
            assert_eq!(json.limits.visualisation_max_values, 100);
            Ok(())
        });
    }

    #[test]
    fn test_explicit_path_must_exist() {
        let err = Config::load(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[test]
    fn test_unsupported_extension() {
        let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        let err = Config::load(Some(file.path())).unwrap_err();
        assert!(matches!(&*err, ErrorKind::UnsupportedFormat(_)));
    }

    #[rstest]
    #[case::zero_rows(0, 2500, "limits.default_max_rows")]
    #[case::too_many_rows(501, 2500, "limits.default_max_rows")]
    #[case::no_vis_values(10, 0, "limits.visualisation_max_values")]
    fn test_validation(#[case] default_max_rows: u32, #[case] visualisation_max_values: u32, #[case] field: &str) {
        let config = Config { limits: Limits { default_max_rows, visualisation_max_values }, ..Config::default() };
        let err = config.validate().unwrap_err();
        assert!(matches!(&*err, ErrorKind::Validation { field: f, .. } if *f == field));
    }

    #[test]
    fn test_relative_storage_root_is_rejected() {
        let config = Config { storage: StorageConfig::Local { root: "objects".into() }, ..Config::default() };
        assert!(config.validate().is_err());
    }
}
