//! Variant repository trait and implementation

use crate::error::{CatalogError, Result};
use crate::models::{Variant, VariantId};
use async_trait::async_trait;
use sqlx::{query, query_as, QueryBuilder, Sqlite, SqlitePool};

use super::BIND_CHUNK_SIZE;

/// Variant repository interface for data access operations
#[async_trait]
pub trait VariantRepository: Send + Sync {
    /// Find a variant by its ID
    async fn find_by_id(&self, id: VariantId) -> Result<Option<Variant>>;

    /// Fetch every variant whose id is in `ids`
    ///
    /// Unknown ids are skipped. Duplicates in `ids` are allowed.
    async fn find_by_ids(&self, ids: &[VariantId]) -> Result<Vec<Variant>>;

    /// Find a variant by exact shortname
    async fn find_by_shortname(&self, shortname: &str) -> Result<Option<Variant>>;

    /// Register a new variant
    ///
    /// # Errors
    /// Returns error if the shortname is blank or already taken.
    async fn insert(&self, shortname: &str) -> Result<VariantId>;

    async fn count(&self) -> Result<i64>;
}

/// SQLite implementation of VariantRepository
pub struct SqliteVariantRepository {
    pool: SqlitePool,
}

impl SqliteVariantRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VariantRepository for SqliteVariantRepository {
    async fn find_by_id(&self, id: VariantId) -> Result<Option<Variant>> {
        let variant = query_as::<_, Variant>("SELECT id, shortname FROM variants WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(variant)
    }

    async fn find_by_ids(&self, ids: &[VariantId]) -> Result<Vec<Variant>> {
        let mut variants = Vec::with_capacity(ids.len());

        for chunk in ids.chunks(BIND_CHUNK_SIZE) {
            let mut builder: QueryBuilder<Sqlite> =
                QueryBuilder::new("SELECT id, shortname FROM variants WHERE id IN (");
            let mut separated = builder.separated(", ");
            for id in chunk {
                separated.push_bind(*id);
            }
            separated.push_unseparated(") ORDER BY id");

            let rows = builder
                .build_query_as::<Variant>()
                .fetch_all(&self.pool)
                .await?;
            variants.extend(rows);
        }

        Ok(variants)
    }

    async fn find_by_shortname(&self, shortname: &str) -> Result<Option<Variant>> {
        let variant =
            query_as::<_, Variant>("SELECT id, shortname FROM variants WHERE shortname = ?")
                .bind(shortname)
                .fetch_optional(&self.pool)
                .await?;

        Ok(variant)
    }

    async fn insert(&self, shortname: &str) -> Result<VariantId> {
        let shortname = shortname.trim();
        if shortname.is_empty() {
            return Err(CatalogError::InvalidInput {
                field: "shortname".to_string(),
                message: "Variant shortname cannot be empty".to_string(),
            });
        }

        let result = query("INSERT INTO variants (shortname) VALUES (?)")
            .bind(shortname)
            .execute(&self.pool)
            .await?;

        Ok(VariantId(result.last_insert_rowid()))
    }

    async fn count(&self) -> Result<i64> {
        let count: (i64,) = query_as("SELECT COUNT(*) FROM variants")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }
}
