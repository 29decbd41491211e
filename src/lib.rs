//! # cdn-updater
//!
//! Command-line front end for the CDN reconciler: resolves configuration from
//! a TOML file, the environment and flags, takes the process lock, and runs a
//! single pass over the `cdn_queue`.

use anyhow::{Context, Result};
use bridge_desktop::LocalMirrorBackend;
use bridge_traits::StorageBackend;
use clap::{ArgAction, Parser};
use core_catalog::db::{create_pool, DatabaseConfig};
use core_catalog::{CatalogStore, FileSystemAssetLocator, SqliteCatalogStore};
use core_runtime::logging::{redact_if_sensitive, LogFormat};
use core_runtime::{CdnConfig, ConfigFile, StorageTarget};
use core_sync::{
    PassReport, ProcessLock, Reconciler, ReconcilerConfig, SqliteTaskQueue, SyncError,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};

/// Publish queued media renditions to the CDN and remove deleted ones
#[derive(Parser)]
#[command(name = "cdn-updater", version, about, long_about = None)]
pub struct Cli {
    /// TOML configuration file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Catalog database DSN (e.g. sqlite:/var/lib/media/catalog.db)
    #[arg(long, env = "CDN_DATABASE_DSN", value_name = "DSN")]
    pub database_dsn: Option<String>,

    /// Destination bucket
    #[arg(long, env = "CDN_STORAGE_BUCKET")]
    pub bucket: Option<String>,

    #[arg(long, env = "CDN_STORAGE_ACCESS_KEY", hide_env_values = true)]
    pub access_key: Option<String>,

    #[arg(long, env = "CDN_STORAGE_SECRET", hide_env_values = true)]
    pub secret: Option<String>,

    /// Directory the catalog's rendition files are stored under
    #[arg(long, env = "CDN_SOURCE_DIR", value_name = "DIR")]
    pub source_dir: Option<PathBuf>,

    #[arg(long, env = "CDN_STORAGE_REGION")]
    pub region: Option<String>,

    /// Endpoint of an S3-compatible service
    #[arg(long, env = "CDN_STORAGE_ENDPOINT", value_name = "URL")]
    pub endpoint: Option<String>,

    /// Prefix prepended to every object key
    #[arg(long, value_name = "PREFIX")]
    pub key_prefix: Option<String>,

    /// Single-instance lock file
    #[arg(long, env = "CDN_LOCK_FILE", value_name = "FILE")]
    pub lock_file: Option<PathBuf>,

    /// Publish into a local directory instead of a bucket
    #[arg(long, value_name = "DIR")]
    pub mirror_dir: Option<PathBuf>,

    /// Log output format: compact, pretty or json
    #[arg(long, default_value = "compact", value_name = "FORMAT")]
    pub log_format: LogFormat,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Resolve the effective configuration
    ///
    /// Values from `--config` are applied first; flags and environment
    /// variables override them.
    pub fn to_config(&self) -> core_runtime::Result<CdnConfig> {
        let mut builder = CdnConfig::builder();

        if let Some(path) = &self.config {
            builder = builder.with_file(ConfigFile::load(path)?);
        }
        if let Some(dsn) = &self.database_dsn {
            builder = builder.database_dsn(dsn);
        }
        if let Some(bucket) = &self.bucket {
            builder = builder.bucket(bucket);
        }
        if let Some(access_key) = &self.access_key {
            builder = builder.access_key(access_key);
        }
        if let Some(secret) = &self.secret {
            builder = builder.secret(secret);
        }
        if let Some(dir) = &self.source_dir {
            builder = builder.source_dir(dir);
        }
        if let Some(region) = &self.region {
            builder = builder.region(region);
        }
        if let Some(endpoint) = &self.endpoint {
            builder = builder.endpoint(endpoint);
        }
        if let Some(prefix) = &self.key_prefix {
            builder = builder.key_prefix(prefix);
        }
        if let Some(lock_file) = &self.lock_file {
            builder = builder.lock_file(lock_file);
        }
        if let Some(dir) = &self.mirror_dir {
            builder = builder.mirror_dir(dir);
        }

        builder.build()
    }
}

/// Process exit status for a finished invocation
pub fn exit_code(result: &Result<PassReport>) -> ExitCode {
    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => match err.downcast_ref::<SyncError>() {
            Some(SyncError::LockContention { .. }) => ExitCode::from(3),
            _ => ExitCode::FAILURE,
        },
    }
}

/// Build the storage backend for the configured target
pub async fn connect_storage(target: &StorageTarget) -> Result<Arc<dyn StorageBackend>> {
    match target {
        StorageTarget::Mirror { root } => Ok(Arc::new(LocalMirrorBackend::new(root.clone()))),
        #[cfg(feature = "s3")]
        StorageTarget::S3(s3) => {
            use bridge_desktop::{S3Settings, S3StorageBackend};

            let settings = S3Settings {
                bucket: s3.bucket.clone(),
                region: s3.region.clone(),
                endpoint: s3.endpoint.clone(),
                access_key_id: s3.access_key.clone(),
                secret_access_key: s3.secret.clone(),
                key_prefix: s3.key_prefix.clone(),
            };
            if let Some(key) = &settings.access_key_id {
                info!(
                    access_key = %redact_if_sensitive("access_key", key),
                    "Using static storage credentials"
                );
            }
            Ok(Arc::new(S3StorageBackend::connect(settings).await))
        }
        #[cfg(not(feature = "s3"))]
        StorageTarget::S3(s3) => anyhow::bail!(
            "bucket '{}' configured but S3 support is not compiled in; \
             rebuild with the `s3` feature or use --mirror-dir",
            s3.bucket
        ),
    }
}

/// Run one locked reconciliation pass
///
/// # Errors
///
/// Fails with [`SyncError::LockContention`] (inside the `anyhow` chain) when
/// another updater is running, or with the first fatal database, catalog or
/// configuration error.
pub async fn run(config: &CdnConfig) -> Result<PassReport> {
    let lock = ProcessLock::new(&config.lock_file);
    let _guard = lock.try_acquire()?;

    info!(
        database = %redact_if_sensitive("dsn", &config.database_dsn),
        source_dir = %config.source_dir.display(),
        "Starting CDN update"
    );

    let pool = create_pool(DatabaseConfig::from_url(config.database_url()))
        .await
        .context("Failed to open catalog database")?;

    let catalog: Arc<dyn CatalogStore> = Arc::new(SqliteCatalogStore::new(pool.clone()));
    let queue = SqliteTaskQueue::new(pool.clone(), catalog.clone());
    queue.initialize().await?;

    let storage = connect_storage(&config.storage).await?;

    let reconciler = Reconciler::new(
        ReconcilerConfig::new(&config.source_dir),
        Arc::new(queue),
        catalog,
        storage,
        Arc::new(FileSystemAssetLocator::new()),
    );

    let report = reconciler.run_pass().await;
    pool.close().await;
    let report = report?;

    for failure in &report.failed {
        warn!(
            task_id = %failure.task_id,
            operation = %failure.operation,
            error = %failure.error,
            "Task left in queue"
        );
    }
    info!(
        discovered = report.discovered,
        completed = report.completed(),
        failed = report.failed.len(),
        rejected = report.rejected,
        "All done"
    );

    Ok(report)
}
