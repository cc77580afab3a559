mod cli;
mod error;
mod logging;

use crate::cli::{Cli, Command};
use crate::error::{ErrorKind, Result};
use clap::Parser;
use dbhub_cache::{CacheHandle, MemoryCache, NoCache, SqliteCache};
use dbhub_config::{CacheBackend, Config, StorageConfig};
use dbhub_metastore::{Database, Repository};
use dbhub_render::Response;
use dbhub_service::{
    Actor, CsvRequest, DatabaseRef, DownloadRequest, Service, Settings, TableRequest, VisRequest, error_response,
};
use dbhub_storage::BackendHandle;
use dbhub_storage::backend::LocalBackend;
use exn::ResultExt;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::AsyncWrite;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            tracing::error!(error = ?err, "Start-up failed");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        },
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    logging::init(&config.log_level);
    let service = build_service(&config).await?;

    let service = &service;
    let (result, output) = match cli.command {
        Command::Table(args) => {
            let request = database(&args.database).map(|database| TableRequest {
                actor: Actor::from(args.actor.user),
                database,
                table: args.table,
            });
            let result = match request {
                Ok(request) => service.table_view(&request).await,
                Err(err) => Err(err),
            };
            (result, args.output)
        },
        Command::Vis(args) => {
            let request = database(&args.database).map(|database| VisRequest {
                actor: Actor::from(args.actor.user),
                database,
                table: args.table,
                x: args.x,
                y: args.y,
                filter_column: args.where_col,
                filter_operator: args.where_op,
                filter_value: args.where_val,
            });
            let result = match request {
                Ok(request) => service.vis_data(&request).await,
                Err(err) => Err(err),
            };
            (result, args.output)
        },
        Command::Csv(args) => {
            let request = database(&args.database).map(|database| CsvRequest {
                actor: Actor::from(args.actor.user),
                database,
                table: args.table,
                version: args.version,
            });
            let result = match request {
                Ok(request) => service.download_csv(&request).await,
                Err(err) => Err(err),
            };
            (result, args.output)
        },
        Command::Download(args) => {
            let request = database(&args.database).map(|database| DownloadRequest {
                actor: Actor::from(args.actor.user),
                database,
                version: args.version,
            });
            let result = match request {
                Ok(request) => service.download(&request).await,
                Err(err) => Err(err),
            };
            (result, Some(args.output))
        },
        Command::Publish(args) => {
            let data = tokio::fs::read(&args.file).await.or_raise(|| ErrorKind::Input(args.file.clone()))?;
            let published = match database(&args.database) {
                Ok(database) => service.publish(&database, &data, args.public, args.bucket.as_deref()).await,
                Err(err) => Err(err),
            };
            return match published {
                Ok(version) => {
                    println!(
                        "{}/{} version {} ({} bytes, {})",
                        version.owner, version.name, version.version, version.size, version.content_hash
                    );
                    Ok(ExitCode::SUCCESS)
                },
                Err(err) => Ok(fail(&err)),
            };
        },
    };

    match result {
        Ok(response) => {
            deliver(response, output.as_deref()).await?;
            Ok(ExitCode::SUCCESS)
        },
        Err(err) => Ok(fail(&err)),
    }
}

fn database(value: &str) -> dbhub_service::error::Result<DatabaseRef> {
    value.parse()
}

/// Print the error page to stderr.
fn fail(err: &dbhub_service::error::Error) -> ExitCode {
    let response = error_response(err);
    eprintln!("{}", String::from_utf8_lossy(response.bytes().unwrap_or_default()));
    ExitCode::FAILURE
}

async fn deliver(response: Response, output: Option<&Path>) -> Result<()> {
    if let Some(disposition) = &response.content_disposition {
        tracing::debug!(content_type = response.content_type, disposition, "Writing attachment");
    }
    let mut sink: Box<dyn AsyncWrite + Unpin> = match output {
        Some(path) => Box::new(tokio::fs::File::create(path).await.or_raise(|| ErrorKind::Output)?),
        None => Box::new(tokio::io::stdout()),
    };
    let delivery = response.write_to(&mut sink).await.or_raise(|| ErrorKind::Output)?;
    tracing::debug!(bytes = delivery.bytes, complete = delivery.complete, "Response written");
    if !delivery.complete {
        exn::bail!(ErrorKind::Output);
    }
    Ok(())
}

async fn build_service(config: &Config) -> Result<Service> {
    ensure_parent(&config.metadata.path).await?;
    let db = Database::connect(&config.metadata.path).await.or_raise(|| ErrorKind::Metadata)?;
    let storage = build_storage(&config.storage)?;
    let cache = build_cache(&config.cache.backend).await?;
    if let Some(dir) = &config.temp_dir {
        tokio::fs::create_dir_all(dir).await.or_raise(|| ErrorKind::Directory(dir.clone()))?;
    }
    let settings = Settings {
        metadata_ttl: config.cache.metadata_ttl(),
        output_ttl: config.cache.output_ttl(),
        default_max_rows: config.limits.default_max_rows,
        visualisation_max_values: config.limits.visualisation_max_values,
        temp_dir: config.temp_dir.clone(),
    };
    Ok(Service::new(Repository::from(&db), storage, cache, settings))
}

fn build_storage(config: &StorageConfig) -> Result<BackendHandle> {
    match config {
        StorageConfig::Local { root } => {
            Ok(Arc::new(LocalBackend::new("local", root).or_raise(|| ErrorKind::Storage)?))
        },
        #[cfg(feature = "s3")]
        StorageConfig::S3 { region, endpoint, key_id, key_secret, prefix } => {
            let backend = dbhub_storage::backend::S3Backend::new(
                "s3",
                prefix.clone(),
                region,
                endpoint.clone(),
                key_id,
                key_secret,
            )
            .or_raise(|| ErrorKind::Storage)?;
            Ok(Arc::new(backend))
        },
        #[cfg(not(feature = "s3"))]
        StorageConfig::S3 { .. } => exn::bail!(ErrorKind::S3Unsupported),
    }
}

async fn build_cache(backend: &CacheBackend) -> Result<CacheHandle> {
    let cache: CacheHandle = match backend {
        CacheBackend::Memory => Arc::new(MemoryCache::new()),
        CacheBackend::Sqlite { path } => {
            ensure_parent(path).await?;
            Arc::new(SqliteCache::connect(path).await.or_raise(|| ErrorKind::Cache)?)
        },
        CacheBackend::Disabled => Arc::new(NoCache),
    };
    Ok(cache)
}

async fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.or_raise(|| ErrorKind::Directory(PathBuf::from(parent)))?;
    }
    Ok(())
}
