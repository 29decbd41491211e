//! # CDN Updater Configuration
//!
//! Provides configuration management for one reconciliation run.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CdnConfig`
//! holding everything the updater needs: where the catalog database lives,
//! which object store to publish to and with which credentials, and where
//! asset files are read from. Validation is fail-fast: an invalid or
//! incomplete configuration is rejected before any task is touched.
//!
//! ## Sources
//!
//! Settings are layered, later layers winning:
//!
//! 1. Built-in defaults (lock file location)
//! 2. An optional TOML file ([`ConfigFile`])
//! 3. Explicit builder calls (the CLI maps flags and `CDN_*` environment
//!    variables onto these)
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CdnConfig;
//!
//! let config = CdnConfig::builder()
//!     .database_dsn("sqlite:/var/lib/media/catalog.db")
//!     .bucket("media-cdn")
//!     .credentials("AKIA...", "secret")
//!     .source_dir("/var/lib/media/files")
//!     .build()?;
//! ```
//!
//! ## File Format
//!
//! ```toml
//! source_dir = "/var/lib/media/files"
//! lock_file = "/run/cdn-updater.lock"
//!
//! [database]
//! dsn = "sqlite:/var/lib/media/catalog.db"
//!
//! [storage]
//! bucket = "media-cdn"
//! access_key = "AKIA..."
//! secret = "..."
//! region = "eu-west-1"
//! ```

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Suffix of the default lock file, which sits next to the catalog database
pub const DEFAULT_LOCK_FILE_SUFFIX: &str = ".cdn-updater.lock";

/// Lock file name used when the catalog has no database file
pub const DEFAULT_LOCK_FILE_NAME: &str = "cdn-updater.lock";

/// Where remote objects are published
#[derive(Clone, PartialEq, Eq)]
pub enum StorageTarget {
    /// Amazon S3 or an S3-compatible service
    S3(S3Target),
    /// A local directory standing in for the bucket
    Mirror { root: PathBuf },
}

/// S3 connection settings
#[derive(Clone, Default, PartialEq, Eq)]
pub struct S3Target {
    pub bucket: String,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret: Option<String>,
    pub key_prefix: Option<String>,
}

impl std::fmt::Debug for S3Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Target")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("access_key", &self.access_key.as_ref().map(|_| "[REDACTED]"))
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .field("key_prefix", &self.key_prefix)
            .finish()
    }
}

impl std::fmt::Debug for StorageTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::S3(target) => f.debug_tuple("S3").field(target).finish(),
            Self::Mirror { root } => f.debug_struct("Mirror").field("root", root).finish(),
        }
    }
}

/// Configuration for one CDN updater run.
///
/// Use [`CdnConfigBuilder`] to construct instances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdnConfig {
    /// Catalog database connection target (`sqlite:` URL or file path)
    pub database_dsn: String,

    /// Remote object store to publish to
    pub storage: StorageTarget,

    /// Local root that asset files are resolved against
    pub source_dir: PathBuf,

    /// File used for single-instance locking
    pub lock_file: PathBuf,
}

impl CdnConfig {
    /// Creates a new builder for constructing a `CdnConfig`.
    pub fn builder() -> CdnConfigBuilder {
        CdnConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Database DSN is not blank and names a SQLite database
    /// - Source and lock paths are not empty
    /// - S3 bucket is not blank and credentials are given as a pair
    pub fn validate(&self) -> Result<()> {
        if self.database_dsn.trim().is_empty() {
            return Err(Error::Config("Database DSN cannot be empty".to_string()));
        }

        if let Some(scheme) = dsn_scheme(&self.database_dsn) {
            if scheme != "sqlite" {
                return Err(Error::Config(format!(
                    "Unsupported database scheme '{scheme}': only sqlite is supported"
                )));
            }
        }

        if self.source_dir.as_os_str().is_empty() {
            return Err(Error::Config("Source directory cannot be empty".to_string()));
        }

        if self.lock_file.as_os_str().is_empty() {
            return Err(Error::Config("Lock file path cannot be empty".to_string()));
        }

        match &self.storage {
            StorageTarget::S3(target) => {
                if target.bucket.trim().is_empty() {
                    return Err(Error::Config("Storage bucket cannot be empty".to_string()));
                }

                if target.bucket.contains('/') {
                    return Err(Error::Config(format!(
                        "Storage bucket must be a bucket name, not a path: {}",
                        target.bucket
                    )));
                }

                match (&target.access_key, &target.secret) {
                    (Some(_), None) | (None, Some(_)) => {
                        return Err(Error::Config(
                            "Storage access key and secret must be provided together"
                                .to_string(),
                        ));
                    }
                    (Some(key), Some(secret)) if key.is_empty() || secret.is_empty() => {
                        return Err(Error::Config(
                            "Storage access key and secret cannot be empty".to_string(),
                        ));
                    }
                    _ => {}
                }
            }
            StorageTarget::Mirror { root } => {
                if root.as_os_str().is_empty() {
                    return Err(Error::Config(
                        "Mirror directory cannot be empty".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }

    /// Normalised SQLite URL for the catalog database
    ///
    /// Plain file paths are turned into `sqlite:` URLs; `sqlite:` URLs are
    /// passed through. Other schemes are refused by [`CdnConfig::validate`].
    pub fn database_url(&self) -> String {
        let dsn = self.database_dsn.trim();
        if dsn.starts_with("sqlite:") {
            dsn.to_string()
        } else {
            format!("sqlite:{}", dsn)
        }
    }
}

/// On-disk configuration file.
///
/// Every field is optional; whatever is present is layered under explicit
/// builder calls.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub source_dir: Option<PathBuf>,
    pub lock_file: Option<PathBuf>,
    #[serde(default)]
    pub database: DatabaseSection,
    #[serde(default)]
    pub storage: StorageSection,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DatabaseSection {
    pub dsn: Option<String>,
}

#[derive(Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct StorageSection {
    pub bucket: Option<String>,
    pub access_key: Option<String>,
    pub secret: Option<String>,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub key_prefix: Option<String>,
    pub mirror_dir: Option<PathBuf>,
}

impl std::fmt::Debug for StorageSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageSection")
            .field("bucket", &self.bucket)
            .field("access_key", &self.access_key.as_ref().map(|_| "[REDACTED]"))
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("key_prefix", &self.key_prefix)
            .field("mirror_dir", &self.mirror_dir)
            .finish()
    }
}

impl ConfigFile {
    /// Parse a configuration file from TOML text
    pub fn parse(source: &str, origin: &Path) -> Result<Self> {
        toml::from_str(source).map_err(|e| Error::ConfigParse {
            path: origin.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Read and parse a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| Error::ConfigFile {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::parse(&source, path)
    }
}

/// Builder for constructing [`CdnConfig`] instances.
#[derive(Default, Clone)]
pub struct CdnConfigBuilder {
    database_dsn: Option<String>,
    bucket: Option<String>,
    access_key: Option<String>,
    secret: Option<String>,
    region: Option<String>,
    endpoint: Option<String>,
    key_prefix: Option<String>,
    mirror_dir: Option<PathBuf>,
    source_dir: Option<PathBuf>,
    lock_file: Option<PathBuf>,
}

impl CdnConfigBuilder {
    /// Seed the builder from a parsed configuration file.
    ///
    /// Values present in the file replace what the builder already holds, so
    /// call this before the explicit setters.
    pub fn with_file(mut self, file: ConfigFile) -> Self {
        let ConfigFile {
            source_dir,
            lock_file,
            database,
            storage,
        } = file;

        self.database_dsn = database.dsn.or(self.database_dsn);
        self.bucket = storage.bucket.or(self.bucket);
        self.access_key = storage.access_key.or(self.access_key);
        self.secret = storage.secret.or(self.secret);
        self.region = storage.region.or(self.region);
        self.endpoint = storage.endpoint.or(self.endpoint);
        self.key_prefix = storage.key_prefix.or(self.key_prefix);
        self.mirror_dir = storage.mirror_dir.or(self.mirror_dir);
        self.source_dir = source_dir.or(self.source_dir);
        self.lock_file = lock_file.or(self.lock_file);
        self
    }

    /// Sets the catalog database connection target.
    pub fn database_dsn(mut self, dsn: impl Into<String>) -> Self {
        self.database_dsn = Some(dsn.into());
        self
    }

    /// Sets the destination bucket.
    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    /// Sets the storage access key.
    pub fn access_key(mut self, access_key: impl Into<String>) -> Self {
        self.access_key = Some(access_key.into());
        self
    }

    /// Sets the storage secret.
    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// Sets access key and secret together.
    pub fn credentials(self, access_key: impl Into<String>, secret: impl Into<String>) -> Self {
        self.access_key(access_key).secret(secret)
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Sets a custom endpoint for S3-compatible services.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    /// Publish into a local directory instead of S3.
    ///
    /// Takes precedence over any bucket setting.
    pub fn mirror_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.mirror_dir = Some(path.into());
        self
    }

    /// Sets the local root that asset files are resolved against.
    pub fn source_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.source_dir = Some(path.into());
        self
    }

    /// Sets the single-instance lock file.
    pub fn lock_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.lock_file = Some(path.into());
        self
    }

    /// Builds and validates the final configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingSetting`] when a required setting is absent and
    /// [`Error::Config`] when a provided value is invalid.
    pub fn build(self) -> Result<CdnConfig> {
        let database_dsn = self.database_dsn.ok_or_else(|| Error::MissingSetting {
            setting: "database_dsn".to_string(),
            message: "Set `[database] dsn` in the config file, pass --database-dsn, \
                      or export CDN_DATABASE_DSN."
                .to_string(),
        })?;

        let source_dir = self.source_dir.ok_or_else(|| Error::MissingSetting {
            setting: "source_dir".to_string(),
            message: "Set `source_dir` in the config file, pass --source-dir, \
                      or export CDN_SOURCE_DIR."
                .to_string(),
        })?;

        let storage = match (self.mirror_dir, self.bucket) {
            (Some(root), _) => StorageTarget::Mirror { root },
            (None, Some(bucket)) => StorageTarget::S3(S3Target {
                bucket,
                region: self.region,
                endpoint: self.endpoint,
                access_key: self.access_key,
                secret: self.secret,
                key_prefix: self.key_prefix,
            }),
            (None, None) => {
                return Err(Error::MissingSetting {
                    setting: "storage_bucket".to_string(),
                    message: "Set `[storage] bucket` in the config file, pass --bucket, \
                              or export CDN_STORAGE_BUCKET. Use --mirror-dir to publish \
                              into a local directory instead."
                        .to_string(),
                })
            }
        };

        let lock_file = self
            .lock_file
            .unwrap_or_else(|| default_lock_file(&database_dsn));

        let config = CdnConfig {
            database_dsn,
            storage,
            source_dir,
            lock_file,
        };

        config.validate()?;
        Ok(config)
    }
}

/// Default lock file for a catalog database
///
/// Every updater draining the same queue opens the same database file, so the
/// lock sits beside it as `<database>.cdn-updater.lock`. In-memory databases
/// are private to one process and fall back to the system temp directory.
pub fn default_lock_file(database_dsn: &str) -> PathBuf {
    match database_file(database_dsn) {
        Some(db) => {
            let mut name = db.as_os_str().to_os_string();
            name.push(DEFAULT_LOCK_FILE_SUFFIX);
            PathBuf::from(name)
        }
        None => std::env::temp_dir().join(DEFAULT_LOCK_FILE_NAME),
    }
}

/// Path of the SQLite database file a DSN opens, if it opens one
fn database_file(database_dsn: &str) -> Option<PathBuf> {
    let dsn = database_dsn.trim();
    let rest = dsn.strip_prefix("sqlite:").unwrap_or(dsn);
    let rest = rest.strip_prefix("//").unwrap_or(rest);
    let (path, query) = rest.split_once('?').unwrap_or((rest, ""));

    if path.is_empty() || path == ":memory:" || query.contains("mode=memory") {
        return None;
    }
    Some(PathBuf::from(path))
}

/// URL scheme of a DSN (`sqlite` in `sqlite:/a.db`)
///
/// Single letters are treated as Windows drive prefixes, not schemes.
fn dsn_scheme(database_dsn: &str) -> Option<&str> {
    let (scheme, _) = database_dsn.trim().split_once(':')?;
    let mut chars = scheme.chars();
    let starts_alpha = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
    let valid = chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));

    (starts_alpha && valid && scheme.len() > 1).then_some(scheme)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_builder() -> CdnConfigBuilder {
        CdnConfig::builder()
            .database_dsn("sqlite:/tmp/catalog.db")
            .bucket("media-cdn")
            .source_dir("/var/lib/media")
    }

    #[test]
    fn test_build_minimal_s3_config() {
        let config = base_builder().build().unwrap();

        assert_eq!(config.database_dsn, "sqlite:/tmp/catalog.db");
        assert_eq!(config.source_dir, PathBuf::from("/var/lib/media"));
        assert_eq!(
            config.lock_file,
            PathBuf::from("/tmp/catalog.db.cdn-updater.lock")
        );
        match config.storage {
            StorageTarget::S3(target) => {
                assert_eq!(target.bucket, "media-cdn");
                assert!(target.access_key.is_none());
            }
            other => panic!("expected S3 target, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_database_dsn() {
        let result = CdnConfig::builder()
            .bucket("media-cdn")
            .source_dir("/var/lib/media")
            .build();

        match result {
            Err(Error::MissingSetting { setting, .. }) => assert_eq!(setting, "database_dsn"),
            other => panic!("expected missing database_dsn, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_storage_target() {
        let result = CdnConfig::builder()
            .database_dsn("catalog.db")
            .source_dir("/var/lib/media")
            .build();

        match result {
            Err(Error::MissingSetting { setting, .. }) => assert_eq!(setting, "storage_bucket"),
            other => panic!("expected missing storage_bucket, got {:?}", other),
        }
    }

    #[test]
    fn test_credentials_must_be_paired() {
        let result = base_builder().access_key("AKIAEXAMPLE").build();
        assert!(matches!(result, Err(Error::Config(_))));

        let config = base_builder()
            .credentials("AKIAEXAMPLE", "secret")
            .build()
            .unwrap();
        match config.storage {
            StorageTarget::S3(target) => {
                assert_eq!(target.access_key.as_deref(), Some("AKIAEXAMPLE"));
                assert_eq!(target.secret.as_deref(), Some("secret"));
            }
            other => panic!("expected S3 target, got {:?}", other),
        }
    }

    #[test]
    fn test_blank_values_rejected() {
        assert!(matches!(
            base_builder().database_dsn("  ").build(),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            base_builder().bucket("").build(),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            base_builder().bucket("media/cdn").build(),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_mirror_dir_wins_over_bucket() {
        let config = base_builder().mirror_dir("/srv/mirror").build().unwrap();
        assert_eq!(
            config.storage,
            StorageTarget::Mirror {
                root: PathBuf::from("/srv/mirror")
            }
        );
    }

    #[test]
    fn test_database_url_normalisation() {
        let config = base_builder().database_dsn("/tmp/catalog.db").build().unwrap();
        assert_eq!(config.database_url(), "sqlite:/tmp/catalog.db");

        let config = base_builder()
            .database_dsn("sqlite::memory:")
            .build()
            .unwrap();
        assert_eq!(config.database_url(), "sqlite::memory:");
    }

    #[test]
    fn test_default_lock_file_follows_database() {
        let url = default_lock_file("sqlite:/var/lib/media/catalog.db");
        let path = default_lock_file("/var/lib/media/catalog.db");
        let with_query = default_lock_file("sqlite:///var/lib/media/catalog.db?mode=rwc");

        assert_eq!(url, PathBuf::from("/var/lib/media/catalog.db.cdn-updater.lock"));
        assert_eq!(path, url);
        assert_eq!(with_query, url);
        assert_ne!(default_lock_file("sqlite:/srv/other.db"), url);

        assert_eq!(
            default_lock_file("sqlite::memory:"),
            std::env::temp_dir().join(DEFAULT_LOCK_FILE_NAME)
        );
    }

    #[test]
    fn test_same_database_shares_lock_file() {
        let first = base_builder().build().unwrap();
        let second = CdnConfig::builder()
            .database_dsn("sqlite:/tmp/catalog.db")
            .mirror_dir("/srv/mirror")
            .source_dir("/srv/elsewhere")
            .build()
            .unwrap();

        assert_eq!(first.lock_file, second.lock_file);
    }

    #[test]
    fn test_non_sqlite_scheme_rejected() {
        assert!(matches!(
            base_builder().database_dsn("postgres://db/media").build(),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            base_builder().database_dsn("mysql:host=db").build(),
            Err(Error::Config(_))
        ));
        assert!(base_builder().database_dsn("C:/media/catalog.db").build().is_ok());
    }

    #[test]
    fn test_parse_config_file() {
        let source = r#"
            source_dir = "/var/lib/media"
            lock_file = "/run/cdn.lock"

            [database]
            dsn = "sqlite:/var/lib/media/catalog.db"

            [storage]
            bucket = "media-cdn"
            access_key = "AKIAEXAMPLE"
            secret = "secret"
            region = "eu-west-1"
        "#;

        let file = ConfigFile::parse(source, Path::new("cdn.toml")).unwrap();
        let config = CdnConfig::builder().with_file(file).build().unwrap();

        assert_eq!(config.lock_file, PathBuf::from("/run/cdn.lock"));
        assert_eq!(config.database_dsn, "sqlite:/var/lib/media/catalog.db");
        match config.storage {
            StorageTarget::S3(target) => {
                assert_eq!(target.region.as_deref(), Some("eu-west-1"));
            }
            other => panic!("expected S3 target, got {:?}", other),
        }
    }

    #[test]
    fn test_explicit_settings_override_file() {
        let file = ConfigFile {
            database: DatabaseSection {
                dsn: Some("sqlite:file.db".to_string()),
            },
            ..Default::default()
        };

        let config = base_builder()
            .with_file(file)
            .database_dsn("sqlite:cli.db")
            .build()
            .unwrap();
        assert_eq!(config.database_dsn, "sqlite:cli.db");
    }

    #[test]
    fn test_file_does_not_clobber_earlier_values_with_none() {
        let config = base_builder()
            .with_file(ConfigFile::default())
            .build()
            .unwrap();
        assert_eq!(config.database_dsn, "sqlite:/tmp/catalog.db");
    }

    #[test]
    fn test_unknown_file_keys_rejected() {
        let result = ConfigFile::parse("bucket = \"oops\"", Path::new("cdn.toml"));
        assert!(matches!(result, Err(Error::ConfigParse { .. })));
    }

    #[test]
    fn test_debug_redacts_credentials() {
        let config = base_builder()
            .credentials("AKIAEXAMPLE", "hunter2")
            .build()
            .unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("AKIAEXAMPLE"));
        assert!(!rendered.contains("hunter2"));
    }
}
