//! Object Storage Abstractions
//!
//! Provides the platform-agnostic contract for the remote CDN / object store
//! that local media renditions are mirrored to.

use async_trait::async_trait;
use std::path::Path;

use crate::error::{BridgeError, Result};

/// Remote object storage trait
///
/// Abstracts the two primitives the CDN updater needs from an object store:
/// - S3 (or any S3-compatible service)
/// - A local directory mirror for development and tests
///
/// Keys are bucket-relative paths such as `images/200w/42.jpg`. Both
/// operations must be idempotent: re-uploading an object that already exists
/// or deleting an object that is already gone succeeds.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::StorageBackend;
///
/// async fn publish(backend: &dyn StorageBackend, file: &Path) -> Result<()> {
///     backend.put_object(file, "images/200w/42.jpg", "image/jpeg").await?;
///     Ok(())
/// }
/// ```
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Upload a local file to `remote_path`, replacing any existing object
    ///
    /// # Arguments
    ///
    /// * `local_path` - File on the local filesystem to upload
    /// * `remote_path` - Destination key relative to the bucket
    /// * `mime_type` - `Content-Type` stored with the object
    async fn put_object(&self, local_path: &Path, remote_path: &str, mime_type: &str)
        -> Result<()>;

    /// Delete the object at `remote_path`
    ///
    /// Callers must never pass an empty key; implementations reject one with
    /// [`BridgeError::InvalidKey`] because some services treat it as the
    /// bucket root.
    async fn delete_object(&self, remote_path: &str) -> Result<()>;

    /// Short human-readable name used in logs (e.g. `s3://media-bucket`)
    fn describe(&self) -> String;
}

/// Normalise a bucket-relative key
///
/// Strips leading slashes and rejects keys that are blank, contain `..`
/// segments, or would otherwise address something other than a single object.
pub fn normalize_key(remote_path: &str) -> Result<&str> {
    let key = remote_path.trim().trim_start_matches('/');

    if key.is_empty() {
        return Err(BridgeError::InvalidKey(
            "object key must not be empty".to_string(),
        ));
    }

    if key.ends_with('/') {
        return Err(BridgeError::InvalidKey(format!(
            "object key must not address a prefix: {}",
            remote_path
        )));
    }

    if key.split('/').any(|segment| segment == "..") {
        return Err(BridgeError::InvalidKey(format!(
            "object key must not contain '..' segments: {}",
            remote_path
        )));
    }

    Ok(key)
}
