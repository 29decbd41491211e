//! Asset repository trait and implementation
//!
//! Assets are loaded together with their renditions in a single joined
//! query, so a batch of ids costs one round-trip regardless of how many
//! variants each asset carries.

use crate::error::{CatalogError, Result};
use crate::models::{Asset, AssetId, NewRendition, Rendition, VariantId};
use async_trait::async_trait;
use sqlx::{query, query_as, FromRow, QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use super::BIND_CHUNK_SIZE;

/// Asset repository interface for data access operations
#[async_trait]
pub trait AssetRepository: Send + Sync {
    /// Find an asset (with renditions) by its ID
    async fn find_by_id(&self, id: AssetId) -> Result<Option<Asset>>;

    /// Fetch every asset whose id is in `ids`, ordered by id
    ///
    /// Unknown ids are skipped. Duplicates in `ids` are allowed.
    async fn find_by_ids(&self, ids: &[AssetId]) -> Result<Vec<Asset>>;

    /// Register a new asset in a media set
    async fn insert(&self, set_shortname: &str) -> Result<AssetId>;

    /// Attach a rendition to an asset; it starts off-CDN
    ///
    /// # Errors
    /// Returns error if validation fails, the asset or variant does not
    /// exist, or the rendition is already registered.
    async fn add_rendition(&self, asset_id: AssetId, rendition: &NewRendition) -> Result<()>;

    /// Set the CDN presence flag for one of the asset's variants
    ///
    /// # Returns
    /// - `Ok(true)` if the flag was written
    /// - `Ok(false)` if the asset has no rendition for that variant
    async fn set_cdn_presence(
        &self,
        asset_id: AssetId,
        variant_shortname: &str,
        present: bool,
    ) -> Result<bool>;

    /// Delete an asset and its renditions
    ///
    /// Queue rows referencing the asset keep their variant and remote path
    /// with the asset reference cleared.
    async fn delete(&self, id: AssetId) -> Result<bool>;
}

/// Row shape of the assets/renditions/variants join
#[derive(Debug, FromRow)]
struct AssetRenditionRow {
    asset_id: AssetId,
    set_shortname: String,
    variant_id: Option<VariantId>,
    variant_shortname: Option<String>,
    filename: Option<String>,
    mime_type: Option<String>,
    on_cdn: Option<bool>,
}

const SELECT_ASSETS: &str = r#"
    SELECT a.id AS asset_id, a.set_shortname,
           r.variant_id, v.shortname AS variant_shortname,
           r.filename, r.mime_type, r.on_cdn
    FROM assets a
    LEFT JOIN asset_renditions r ON r.asset_id = a.id
    LEFT JOIN variants v ON v.id = r.variant_id
"#;

/// Fold joined rows (sorted by asset id) into assets
fn collect_assets(rows: Vec<AssetRenditionRow>) -> Vec<Asset> {
    let mut assets: Vec<Asset> = Vec::new();

    for row in rows {
        let needs_new = assets.last().map_or(true, |a| a.id != row.asset_id);
        if needs_new {
            assets.push(Asset {
                id: row.asset_id,
                set_shortname: row.set_shortname.clone(),
                renditions: Vec::new(),
            });
        }

        if let (
            Some(variant_id),
            Some(variant_shortname),
            Some(filename),
            Some(mime_type),
            Some(on_cdn),
        ) = (
            row.variant_id,
            row.variant_shortname,
            row.filename,
            row.mime_type,
            row.on_cdn,
        ) {
            if let Some(asset) = assets.last_mut() {
                asset.renditions.push(Rendition {
                    variant_id,
                    variant_shortname,
                    filename,
                    mime_type,
                    on_cdn,
                });
            }
        }
    }

    assets
}

/// SQLite implementation of AssetRepository
pub struct SqliteAssetRepository {
    pool: SqlitePool,
}

impl SqliteAssetRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AssetRepository for SqliteAssetRepository {
    async fn find_by_id(&self, id: AssetId) -> Result<Option<Asset>> {
        let sql = format!("{SELECT_ASSETS} WHERE a.id = ? ORDER BY r.variant_id");
        let rows = query_as::<_, AssetRenditionRow>(&sql)
            .bind(id)
            .fetch_all(&self.pool)
            .await?;

        Ok(collect_assets(rows).into_iter().next())
    }

    async fn find_by_ids(&self, ids: &[AssetId]) -> Result<Vec<Asset>> {
        let mut assets = Vec::with_capacity(ids.len());

        for chunk in ids.chunks(BIND_CHUNK_SIZE) {
            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_ASSETS);
            builder.push(" WHERE a.id IN (");
            let mut separated = builder.separated(", ");
            for id in chunk {
                separated.push_bind(*id);
            }
            separated.push_unseparated(") ORDER BY a.id, r.variant_id");

            let rows = builder
                .build_query_as::<AssetRenditionRow>()
                .fetch_all(&self.pool)
                .await?;
            assets.extend(collect_assets(rows));
        }

        debug!(
            requested = ids.len(),
            found = assets.len(),
            "Loaded assets by id"
        );
        Ok(assets)
    }

    async fn insert(&self, set_shortname: &str) -> Result<AssetId> {
        let set_shortname = set_shortname.trim();
        if set_shortname.is_empty() {
            return Err(CatalogError::InvalidInput {
                field: "set_shortname".to_string(),
                message: "Set shortname cannot be empty".to_string(),
            });
        }

        let result = query("INSERT INTO assets (set_shortname, created_at) VALUES (?, ?)")
            .bind(set_shortname)
            .bind(chrono::Utc::now().timestamp())
            .execute(&self.pool)
            .await?;

        Ok(AssetId(result.last_insert_rowid()))
    }

    async fn add_rendition(&self, asset_id: AssetId, rendition: &NewRendition) -> Result<()> {
        rendition
            .validate()
            .map_err(|e| CatalogError::InvalidInput {
                field: "Rendition".to_string(),
                message: e,
            })?;

        query(
            r#"
            INSERT INTO asset_renditions (asset_id, variant_id, filename, mime_type, on_cdn)
            VALUES (?, ?, ?, ?, 0)
            "#,
        )
        .bind(asset_id)
        .bind(rendition.variant_id)
        .bind(&rendition.filename)
        .bind(&rendition.mime_type)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_cdn_presence(
        &self,
        asset_id: AssetId,
        variant_shortname: &str,
        present: bool,
    ) -> Result<bool> {
        let result = query(
            r#"
            UPDATE asset_renditions SET on_cdn = ?
            WHERE asset_id = ?
              AND variant_id = (SELECT id FROM variants WHERE shortname = ?)
            "#,
        )
        .bind(present)
        .bind(asset_id)
        .bind(variant_shortname)
        .execute(&self.pool)
        .await?;

        debug!(
            asset_id = %asset_id,
            variant = variant_shortname,
            present,
            "CDN presence updated"
        );
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: AssetId) -> Result<bool> {
        let result = query("DELETE FROM assets WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
