//! Storage backend for Amazon S3 and S3-compatible services

use async_trait::async_trait;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::{normalize_key, StorageBackend},
};
use std::path::Path;
use tracing::{debug, info};

/// Connection settings for [`S3StorageBackend::connect`]
///
/// Any field left as `None` falls back to the standard AWS config chain
/// (environment variables, profiles, IMDS).
#[derive(Clone, Default)]
pub struct S3Settings {
    pub bucket: String,
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible services (MinIO, R2, ...)
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    /// Prefix prepended to every object key
    pub key_prefix: Option<String>,
}

impl std::fmt::Debug for S3Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Settings")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field(
                "access_key_id",
                &self.access_key_id.as_ref().map(|_| "[REDACTED]"),
            )
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("key_prefix", &self.key_prefix)
            .finish()
    }
}

/// S3 storage backend
///
/// Thin adapter over `aws-sdk-s3`. It holds no task or catalog logic; the
/// reconciler decides what to upload and delete.
#[derive(Debug, Clone)]
pub struct S3StorageBackend {
    client: Client,
    bucket: String,
    key_prefix: Option<String>,
}

impl S3StorageBackend {
    /// Creates a backend with a pre-built S3 client
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            key_prefix: None,
        }
    }

    /// Prefix every object key with `prefix`
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let trimmed = prefix.trim_matches('/');
        self.key_prefix = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        };
        self
    }

    /// Build a client from `settings` and the standard AWS config chain
    ///
    /// Explicit credentials in `settings` take precedence over the
    /// environment. A custom endpoint switches to path-style addressing,
    /// which most S3-compatible services require.
    pub async fn connect(settings: S3Settings) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());

        if let Some(region) = settings.region.clone() {
            loader = loader.region(Region::new(region));
        }

        if let (Some(access_key), Some(secret)) = (
            settings.access_key_id.clone(),
            settings.secret_access_key.clone(),
        ) {
            loader = loader.credentials_provider(Credentials::new(
                access_key,
                secret,
                None,
                None,
                "cdn-updater",
            ));
        }

        let shared = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = settings.endpoint.clone() {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        info!(
            bucket = %settings.bucket,
            region = ?settings.region,
            endpoint = ?settings.endpoint,
            "Connecting S3 storage backend"
        );

        let backend = Self::new(Client::from_conf(builder.build()), settings.bucket);
        match settings.key_prefix {
            Some(prefix) => backend.with_key_prefix(prefix),
            None => backend,
        }
    }

    /// Bucket this backend writes to
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Full object key for a bucket-relative remote path
    pub fn object_key(&self, remote_path: &str) -> Result<String> {
        let key = normalize_key(remote_path)?;
        Ok(match &self.key_prefix {
            Some(prefix) => format!("{}/{}", prefix, key),
            None => key.to_string(),
        })
    }

    fn remote_error<E>(key: &str, err: E) -> BridgeError
    where
        E: std::error::Error,
    {
        BridgeError::Remote {
            key: key.to_string(),
            message: DisplayErrorContext(err).to_string(),
        }
    }
}

#[async_trait]
impl StorageBackend for S3StorageBackend {
    async fn put_object(
        &self,
        local_path: &Path,
        remote_path: &str,
        mime_type: &str,
    ) -> Result<()> {
        let key = self.object_key(remote_path)?;

        let body = ByteStream::from_path(local_path)
            .await
            .map_err(|e| BridgeError::OperationFailed(format!(
                "failed to read {}: {}",
                local_path.display(),
                e
            )))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(mime_type)
            .body(body)
            .send()
            .await
            .map_err(|e| Self::remote_error(&key, e))?;

        debug!(bucket = %self.bucket, key = %key, mime_type, "Uploaded object");
        Ok(())
    }

    async fn delete_object(&self, remote_path: &str) -> Result<()> {
        let key = self.object_key(remote_path)?;

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| Self::remote_error(&key, e))?;

        debug!(bucket = %self.bucket, key = %key, "Deleted object");
        Ok(())
    }

    fn describe(&self) -> String {
        match &self.key_prefix {
            Some(prefix) => format!("s3://{}/{}", self.bucket, prefix),
            None => format!("s3://{}", self.bucket),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_client() -> Client {
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .credentials_provider(Credentials::new("test", "test", None, None, "test"))
            .build();
        Client::from_conf(config)
    }

    #[test]
    fn test_object_key_without_prefix() {
        let backend = S3StorageBackend::new(offline_client(), "media");
        assert_eq!(
            backend.object_key("/images/200w/42.jpg").unwrap(),
            "images/200w/42.jpg"
        );
    }

    #[test]
    fn test_object_key_with_prefix() {
        let backend = S3StorageBackend::new(offline_client(), "media").with_key_prefix("/cdn/");
        assert_eq!(
            backend.object_key("images/200w/42.jpg").unwrap(),
            "cdn/images/200w/42.jpg"
        );
        assert_eq!(backend.describe(), "s3://media/cdn");
    }

    #[test]
    fn test_blank_prefix_ignored() {
        let backend = S3StorageBackend::new(offline_client(), "media").with_key_prefix("/");
        assert_eq!(backend.describe(), "s3://media");
    }

    #[test]
    fn test_blank_key_never_reaches_bucket() {
        let backend = S3StorageBackend::new(offline_client(), "media").with_key_prefix("cdn");
        assert!(matches!(
            backend.object_key(""),
            Err(BridgeError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_settings_debug_redacts_credentials() {
        let settings = S3Settings {
            bucket: "media".to_string(),
            access_key_id: Some("AKIAEXAMPLE".to_string()),
            secret_access_key: Some("super-secret".to_string()),
            ..Default::default()
        };
        let rendered = format!("{:?}", settings);
        assert!(!rendered.contains("AKIAEXAMPLE"));
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("media"));
    }
}
