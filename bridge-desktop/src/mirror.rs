//! Storage backend that mirrors objects into a local directory

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::{normalize_key, StorageBackend},
};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Tokio-based local mirror
///
/// Treats a directory as the "bucket": object keys become relative paths
/// below `root`. Useful for staging environments and for exercising the
/// updater without cloud credentials.
pub struct LocalMirrorBackend {
    root: PathBuf,
}

impl LocalMirrorBackend {
    /// Create a mirror rooted at `root`
    ///
    /// The directory is created lazily on the first upload.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of the mirror
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a key to its location inside the mirror
    pub fn object_path(&self, remote_path: &str) -> Result<PathBuf> {
        let key = normalize_key(remote_path)?;
        Ok(self.root.join(key))
    }

    fn map_io_error(e: std::io::Error) -> BridgeError {
        BridgeError::Io(e)
    }
}

#[async_trait]
impl StorageBackend for LocalMirrorBackend {
    async fn put_object(
        &self,
        local_path: &Path,
        remote_path: &str,
        mime_type: &str,
    ) -> Result<()> {
        let destination = self.object_path(remote_path)?;

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(Self::map_io_error)?;
        }

        let size = fs::copy(local_path, &destination)
            .await
            .map_err(Self::map_io_error)?;

        debug!(
            source = ?local_path,
            destination = ?destination,
            mime_type,
            size,
            "Mirrored object"
        );
        Ok(())
    }

    async fn delete_object(&self, remote_path: &str) -> Result<()> {
        let target = self.object_path(remote_path)?;

        match fs::remove_file(&target).await {
            Ok(()) => {
                debug!(path = ?target, "Deleted mirrored object");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = ?target, "Mirrored object already absent");
                Ok(())
            }
            Err(e) => Err(Self::map_io_error(e)),
        }
    }

    fn describe(&self) -> String {
        format!("file://{}", self.root.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_creates_nested_object() {
        let source_dir = tempfile::tempdir().unwrap();
        let mirror_dir = tempfile::tempdir().unwrap();

        let source = source_dir.path().join("42.jpg");
        std::fs::write(&source, b"jpeg-bytes").unwrap();

        let backend = LocalMirrorBackend::new(mirror_dir.path());
        backend
            .put_object(&source, "images/200w/42.jpg", "image/jpeg")
            .await
            .unwrap();

        let copied = std::fs::read(mirror_dir.path().join("images/200w/42.jpg")).unwrap();
        assert_eq!(copied, b"jpeg-bytes");
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let mirror_dir = tempfile::tempdir().unwrap();
        let backend = LocalMirrorBackend::new(mirror_dir.path());

        let object = mirror_dir.path().join("images/42/200w.jpg");
        std::fs::create_dir_all(object.parent().unwrap()).unwrap();
        std::fs::write(&object, b"x").unwrap();

        backend.delete_object("images/42/200w.jpg").await.unwrap();
        assert!(!object.exists());

        // Second delete of the same key still succeeds
        backend.delete_object("images/42/200w.jpg").await.unwrap();
    }

    #[tokio::test]
    async fn test_put_missing_source_is_io_error() {
        let mirror_dir = tempfile::tempdir().unwrap();
        let backend = LocalMirrorBackend::new(mirror_dir.path());

        let result = backend
            .put_object(Path::new("/definitely/not/here.jpg"), "a/b.jpg", "image/jpeg")
            .await;
        assert!(matches!(result, Err(BridgeError::Io(_))));
    }

    #[tokio::test]
    async fn test_blank_key_rejected() {
        let mirror_dir = tempfile::tempdir().unwrap();
        let backend = LocalMirrorBackend::new(mirror_dir.path());

        let result = backend.delete_object("").await;
        assert!(matches!(result, Err(BridgeError::InvalidKey(_))));
        assert!(mirror_dir.path().exists(), "root must never be removed");
    }

    #[test]
    fn test_describe() {
        let backend = LocalMirrorBackend::new("/srv/cdn");
        assert_eq!(backend.describe(), "file:///srv/cdn");
    }
}
