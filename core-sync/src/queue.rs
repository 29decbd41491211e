//! # CDN Task Queue
//!
//! Durable queue of outstanding CDN work, stored in the `cdn_queue` table of
//! the catalog database.
//!
//! ## Semantics
//!
//! - **Drain-all**: a pass reads every outstanding task at once, ordered by id
//! - **Delete-on-success**: a task leaves the queue only after it has been
//!   applied; failed tasks stay for the next pass
//! - **Batched loading**: the assets and variants referenced by a batch are
//!   fetched with one bulk query per type and indexed by id
//! - **No silent discard**: rows with an unrecognised operation are reported
//!   in [`PendingBatch::rejected`] and left in place
//!
//! ## Usage
//!
//! ```ignore
//! use core_sync::{NewTask, SqliteTaskQueue, TaskQueue};
//!
//! let queue = SqliteTaskQueue::new(pool.clone(), catalog);
//! queue.initialize().await?;
//!
//! queue.enqueue(&NewTask::copy(asset_id, variant_id)).await?;
//!
//! let batch = queue.load_pending().await?;
//! for task in batch.tasks() {
//!     // ... apply ...
//!     queue.delete(task.id).await?;
//! }
//! ```

use async_trait::async_trait;
use core_catalog::{Asset, AssetId, CatalogStore, Variant, VariantId};
use sqlx::{FromRow, SqlitePool};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{Result, SyncError};
use crate::task::{NewTask, Operation, TaskId, TaskRecord};

/// A queue row whose operation is not one this updater understands
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedTask {
    pub id: TaskId,
    pub operation: String,
}

/// All outstanding tasks plus the catalog objects they reference
///
/// The batch is immutable once loaded; catalog flag writes made while
/// processing one task go to the store and are not visible through it.
#[derive(Debug, Clone, Default)]
pub struct PendingBatch {
    tasks: Vec<TaskRecord>,
    rejected: Vec<RejectedTask>,
    assets: HashMap<AssetId, Asset>,
    variants: HashMap<VariantId, Variant>,
}

impl PendingBatch {
    pub fn new(tasks: Vec<TaskRecord>, assets: Vec<Asset>, variants: Vec<Variant>) -> Self {
        Self {
            tasks,
            rejected: Vec::new(),
            assets: assets.into_iter().map(|a| (a.id, a)).collect(),
            variants: variants.into_iter().map(|v| (v.id, v)).collect(),
        }
    }

    pub fn with_rejected(mut self, rejected: Vec<RejectedTask>) -> Self {
        self.rejected = rejected;
        self
    }

    /// Recognised tasks, ordered by id
    pub fn tasks(&self) -> &[TaskRecord] {
        &self.tasks
    }

    pub fn rejected(&self) -> &[RejectedTask] {
        &self.rejected
    }

    pub fn asset(&self, id: AssetId) -> Option<&Asset> {
        self.assets.get(&id)
    }

    /// The live asset a task refers to, if any
    pub fn asset_for(&self, task: &TaskRecord) -> Option<&Asset> {
        task.asset_id.and_then(|id| self.asset(id))
    }

    pub fn variant(&self, id: VariantId) -> Option<&Variant> {
        self.variants.get(&id)
    }

    /// Number of recognised tasks
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Queue rows seen by the load, recognised or rejected
    pub fn row_count(&self) -> usize {
        self.tasks.len() + self.rejected.len()
    }
}

/// Persistent queue of CDN tasks
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Load every outstanding task with its referenced assets and variants
    async fn load_pending(&self) -> Result<PendingBatch>;

    /// Remove one task by id
    ///
    /// # Returns
    /// - `Ok(true)` if the task was removed
    /// - `Ok(false)` if it was already gone
    async fn delete(&self, id: TaskId) -> Result<bool>;

    /// Append a task
    async fn enqueue(&self, task: &NewTask) -> Result<TaskId>;

    /// Number of rows currently queued, recognised or not
    async fn count(&self) -> Result<u64>;
}

#[derive(Debug, FromRow)]
struct TaskRow {
    id: TaskId,
    operation: String,
    asset_id: Option<AssetId>,
    variant_id: VariantId,
    remote_path: String,
    created_at: i64,
}

/// SQLite implementation of TaskQueue
pub struct SqliteTaskQueue {
    pool: SqlitePool,
    catalog: Arc<dyn CatalogStore>,
}

impl SqliteTaskQueue {
    pub fn new(pool: SqlitePool, catalog: Arc<dyn CatalogStore>) -> Self {
        Self { pool, catalog }
    }

    /// Create the queue table if it does not exist
    pub async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cdn_queue (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                operation TEXT NOT NULL,
                asset_id INTEGER REFERENCES assets(id) ON DELETE SET NULL,
                variant_id INTEGER NOT NULL REFERENCES variants(id),
                remote_path TEXT NOT NULL DEFAULT '',
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| SyncError::Database(e.to_string()))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_cdn_queue_asset ON cdn_queue(asset_id)")
            .execute(&self.pool)
            .await
            .map_err(|e| SyncError::Database(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl TaskQueue for SqliteTaskQueue {
    async fn load_pending(&self) -> Result<PendingBatch> {
        let rows = sqlx::query_as::<_, TaskRow>(
            r#"
            SELECT id, operation, asset_id, variant_id, remote_path, created_at
            FROM cdn_queue
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| SyncError::Database(e.to_string()))?;

        let mut tasks = Vec::with_capacity(rows.len());
        let mut rejected = Vec::new();

        for row in rows {
            match row.operation.parse::<Operation>() {
                Ok(operation) => tasks.push(TaskRecord {
                    id: row.id,
                    operation,
                    asset_id: row.asset_id,
                    variant_id: row.variant_id,
                    remote_path: row.remote_path,
                    created_at: row.created_at,
                }),
                Err(_) => {
                    warn!(
                        task_id = %row.id,
                        operation = %row.operation,
                        "Queue row has unknown operation; leaving it queued"
                    );
                    rejected.push(RejectedTask {
                        id: row.id,
                        operation: row.operation,
                    });
                }
            }
        }

        let asset_ids: Vec<AssetId> = tasks
            .iter()
            .filter_map(|t| t.asset_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let variant_ids: Vec<VariantId> = tasks
            .iter()
            .map(|t| t.variant_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let assets = if asset_ids.is_empty() {
            Vec::new()
        } else {
            self.catalog.assets_by_ids(&asset_ids).await?
        };
        let variants = if variant_ids.is_empty() {
            Vec::new()
        } else {
            self.catalog.variants_by_ids(&variant_ids).await?
        };

        debug!(
            tasks = tasks.len(),
            rejected = rejected.len(),
            assets = assets.len(),
            variants = variants.len(),
            "Loaded pending CDN tasks"
        );

        Ok(PendingBatch::new(tasks, assets, variants).with_rejected(rejected))
    }

    async fn delete(&self, id: TaskId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cdn_queue WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| SyncError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn enqueue(&self, task: &NewTask) -> Result<TaskId> {
        let result = sqlx::query(
            r#"
            INSERT INTO cdn_queue (operation, asset_id, variant_id, remote_path, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(task.operation.as_str())
        .bind(task.asset_id)
        .bind(task.variant_id)
        .bind(&task.remote_path)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| SyncError::Database(e.to_string()))?;

        let id = TaskId(result.last_insert_rowid());
        info!(
            task_id = %id,
            operation = %task.operation,
            variant_id = %task.variant_id,
            "Enqueued CDN task"
        );
        Ok(id)
    }

    async fn count(&self) -> Result<u64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM cdn_queue")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| SyncError::Database(e.to_string()))?;

        Ok(u64::try_from(count.0).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_catalog::db::create_test_pool;
    use core_catalog::{
        AssetRepository, NewRendition, SqliteAssetRepository, SqliteCatalogStore,
        SqliteVariantRepository, VariantRepository,
    };

    async fn setup() -> (SqliteTaskQueue, SqlitePool) {
        let pool = create_test_pool().await.unwrap();
        let catalog = Arc::new(SqliteCatalogStore::new(pool.clone()));
        let queue = SqliteTaskQueue::new(pool.clone(), catalog);
        queue.initialize().await.unwrap();
        (queue, pool)
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let (queue, _) = setup().await;
        queue.initialize().await.unwrap();
        assert_eq!(queue.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_enqueue_load_and_delete() {
        let (queue, pool) = setup().await;
        let variants = SqliteVariantRepository::new(pool.clone());
        let assets = SqliteAssetRepository::new(pool);

        let variant = variants.insert("200w").await.unwrap();
        let asset = assets.insert("images").await.unwrap();
        assets
            .add_rendition(asset, &NewRendition::new(variant, "42.jpg", "image/jpeg"))
            .await
            .unwrap();

        let first = queue.enqueue(&NewTask::copy(asset, variant)).await.unwrap();
        let second = queue
            .enqueue(&NewTask::delete(None, variant, "images/42/200w.jpg"))
            .await
            .unwrap();
        assert!(first < second);

        let batch = queue.load_pending().await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.tasks()[0].id, first);
        assert_eq!(batch.tasks()[1].remote_path, "images/42/200w.jpg");
        assert_eq!(batch.asset_for(&batch.tasks()[0]).unwrap().id, asset);
        assert!(batch.asset_for(&batch.tasks()[1]).is_none());
        assert_eq!(batch.variant(variant).unwrap().shortname, "200w");

        assert!(queue.delete(first).await.unwrap());
        assert!(!queue.delete(first).await.unwrap());
        assert_eq!(queue.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unknown_operation_rejected_not_deleted() {
        let (queue, pool) = setup().await;
        let variant = SqliteVariantRepository::new(pool.clone())
            .insert("thumb")
            .await
            .unwrap();

        sqlx::query(
            "INSERT INTO cdn_queue (operation, variant_id, remote_path, created_at) VALUES ('purge', ?, 'a/b', 0)",
        )
        .bind(variant)
        .execute(&pool)
        .await
        .unwrap();

        let batch = queue.load_pending().await.unwrap();
        assert_eq!(batch.len(), 0);
        assert!(batch.is_empty());
        assert_eq!(batch.row_count(), 1);
        assert_eq!(batch.rejected()[0].operation, "purge");
        assert_eq!(queue.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_asset_removal_keeps_delete_task() {
        let (queue, pool) = setup().await;
        let variant = SqliteVariantRepository::new(pool.clone())
            .insert("200w")
            .await
            .unwrap();
        let assets = SqliteAssetRepository::new(pool);
        let asset = assets.insert("images").await.unwrap();

        queue
            .enqueue(&NewTask::delete(Some(asset), variant, "images/200w/1.jpg"))
            .await
            .unwrap();
        assets.delete(asset).await.unwrap();

        let batch = queue.load_pending().await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.tasks()[0].asset_id, None);
        assert_eq!(batch.tasks()[0].remote_path, "images/200w/1.jpg");
    }

    #[tokio::test]
    async fn test_empty_queue() {
        let (queue, _) = setup().await;
        let batch = queue.load_pending().await.unwrap();
        assert!(batch.is_empty());
    }
}
