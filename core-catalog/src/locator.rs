//! Resolution of catalog renditions to local files and remote object paths

use crate::error::{CatalogError, Result};
use crate::models::{Asset, Variant};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::trace;

/// Where a rendition lives locally and where it goes on the CDN
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAsset {
    pub local_path: PathBuf,
    /// Object path relative to the bucket root, e.g. `images/200w/42.jpg`
    pub remote_path: String,
    pub mime_type: String,
}

/// Resolves an asset's variant into a readable file and its CDN path
#[async_trait]
pub trait AssetLocator: Send + Sync {
    /// # Errors
    ///
    /// - [`CatalogError::RenditionNotFound`] if the asset has no rendition
    ///   for `variant`
    /// - [`CatalogError::FileNotFound`] if the local file is absent
    async fn resolve(
        &self,
        asset: &Asset,
        variant: &Variant,
        source_root: &Path,
    ) -> Result<ResolvedAsset>;
}

/// Locator for the on-disk layout `{root}/{set}/{variant}/{filename}`
///
/// The remote path mirrors the same layout without the root.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSystemAssetLocator;

impl FileSystemAssetLocator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AssetLocator for FileSystemAssetLocator {
    async fn resolve(
        &self,
        asset: &Asset,
        variant: &Variant,
        source_root: &Path,
    ) -> Result<ResolvedAsset> {
        let rendition =
            asset
                .rendition_for(variant.id)
                .ok_or_else(|| CatalogError::RenditionNotFound {
                    asset_id: asset.id.0,
                    variant: variant.shortname.clone(),
                })?;

        let local_path = source_root
            .join(&asset.set_shortname)
            .join(&variant.shortname)
            .join(&rendition.filename);

        if !tokio::fs::try_exists(&local_path).await? {
            return Err(CatalogError::FileNotFound { path: local_path });
        }

        let remote_path = format!(
            "{}/{}/{}",
            asset.set_shortname, variant.shortname, rendition.filename
        );
        trace!(local = %local_path.display(), remote = %remote_path, "Resolved rendition");

        Ok(ResolvedAsset {
            local_path,
            remote_path,
            mime_type: rendition.mime_type.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AssetId, Rendition, VariantId};

    fn asset() -> Asset {
        Asset {
            id: AssetId(42),
            set_shortname: "images".to_string(),
            renditions: vec![Rendition {
                variant_id: VariantId(1),
                variant_shortname: "200w".to_string(),
                filename: "42.jpg".to_string(),
                mime_type: "image/jpeg".to_string(),
                on_cdn: false,
            }],
        }
    }

    #[tokio::test]
    async fn test_resolve_existing_file() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("images").join("200w");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("42.jpg"), b"jpeg").unwrap();

        let resolved = FileSystemAssetLocator::new()
            .resolve(&asset(), &Variant::new(VariantId(1), "200w"), root.path())
            .await
            .unwrap();

        assert_eq!(resolved.local_path, dir.join("42.jpg"));
        assert_eq!(resolved.remote_path, "images/200w/42.jpg");
        assert_eq!(resolved.mime_type, "image/jpeg");
    }

    #[tokio::test]
    async fn test_resolve_missing_file() {
        let root = tempfile::tempdir().unwrap();

        let result = FileSystemAssetLocator::new()
            .resolve(&asset(), &Variant::new(VariantId(1), "200w"), root.path())
            .await;

        match result {
            Err(CatalogError::FileNotFound { path }) => {
                assert!(path.ends_with("images/200w/42.jpg"));
            }
            other => panic!("expected FileNotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_resolve_unknown_rendition() {
        let root = tempfile::tempdir().unwrap();

        let result = FileSystemAssetLocator::new()
            .resolve(&asset(), &Variant::new(VariantId(9), "thumb"), root.path())
            .await;

        assert!(matches!(
            result,
            Err(CatalogError::RenditionNotFound { asset_id: 42, .. })
        ));
    }
}
