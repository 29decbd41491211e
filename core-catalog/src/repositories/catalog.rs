//! Catalog view consumed by the CDN reconciler

use crate::error::Result;
use crate::models::{Asset, AssetId, Variant, VariantId};
use crate::repositories::{
    AssetRepository, SqliteAssetRepository, SqliteVariantRepository, VariantRepository,
};
use async_trait::async_trait;
use sqlx::SqlitePool;

/// Read assets and variants in bulk and record CDN presence
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// One bulk fetch of the given assets; unknown ids are absent from the result
    async fn assets_by_ids(&self, ids: &[AssetId]) -> Result<Vec<Asset>>;

    /// One bulk fetch of the given variants; unknown ids are absent from the result
    async fn variants_by_ids(&self, ids: &[VariantId]) -> Result<Vec<Variant>>;

    /// Mark an asset's variant as present on (or absent from) the CDN
    ///
    /// Returns `false` when the asset has no rendition for the variant.
    async fn set_cdn_presence(
        &self,
        asset_id: AssetId,
        variant_shortname: &str,
        present: bool,
    ) -> Result<bool>;
}

/// `CatalogStore` backed by the SQLite repositories
pub struct SqliteCatalogStore {
    assets: SqliteAssetRepository,
    variants: SqliteVariantRepository,
}

impl SqliteCatalogStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            assets: SqliteAssetRepository::new(pool.clone()),
            variants: SqliteVariantRepository::new(pool),
        }
    }
}

#[async_trait]
impl CatalogStore for SqliteCatalogStore {
    async fn assets_by_ids(&self, ids: &[AssetId]) -> Result<Vec<Asset>> {
        self.assets.find_by_ids(ids).await
    }

    async fn variants_by_ids(&self, ids: &[VariantId]) -> Result<Vec<Variant>> {
        self.variants.find_by_ids(ids).await
    }

    async fn set_cdn_presence(
        &self,
        asset_id: AssetId,
        variant_shortname: &str,
        present: bool,
    ) -> Result<bool> {
        self.assets
            .set_cdn_presence(asset_id, variant_shortname, present)
            .await
    }
}
