//! # CDN Reconciler
//!
//! Drains the task queue once, applying each task against the storage
//! backend and recording the result in the catalog.
//!
//! ## Per-task flow
//!
//! - **copy**: resolve the rendition's local file, upload it, mark the
//!   variant on-CDN, then remove the task. A task whose asset no longer
//!   exists is a no-op and is removed.
//! - **delete**: mark the variant off-CDN if the asset still exists, delete
//!   the remote object if the task names one, then remove the task.
//!
//! The catalog write always happens before the task is removed, so a crash
//! in between repeats idempotent work instead of losing it.
//!
//! ## Failures
//!
//! A missing local file or a failed backend call is logged and recorded in
//! the [`PassReport`]; the task stays queued and the pass moves on. Any
//! other error ends the pass and is returned to the caller.

use bridge_traits::StorageBackend;
use core_catalog::{AssetLocator, CatalogStore};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, instrument, warn, Instrument};

use crate::error::{Result, SyncError};
use crate::queue::{PendingBatch, TaskQueue};
use crate::task::{Operation, TaskId, TaskRecord};

/// Reconciler settings
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Root directory the catalog's rendition files are stored under
    pub source_root: PathBuf,
}

impl ReconcilerConfig {
    pub fn new(source_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
        }
    }
}

/// A task that failed recoverably and remains queued
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskFailure {
    pub task_id: TaskId,
    pub operation: Operation,
    pub error: String,
}

/// Outcome of one pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassReport {
    /// Rows found in the queue, including rejected ones
    pub discovered: usize,
    /// Copy tasks uploaded and removed
    pub copied: usize,
    /// Delete tasks applied and removed
    pub deleted: usize,
    /// Copy tasks removed without work because their asset is gone
    pub skipped: usize,
    pub failed: Vec<TaskFailure>,
    /// Rows with an unknown operation, left queued
    pub rejected: usize,
}

impl PassReport {
    /// Tasks removed from the queue during the pass
    pub fn completed(&self) -> usize {
        self.copied + self.deleted + self.skipped
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskOutcome {
    Copied,
    Deleted,
    Skipped,
}

/// Applies queued CDN work
pub struct Reconciler {
    config: ReconcilerConfig,
    queue: Arc<dyn TaskQueue>,
    catalog: Arc<dyn CatalogStore>,
    storage: Arc<dyn StorageBackend>,
    locator: Arc<dyn AssetLocator>,
}

impl Reconciler {
    pub fn new(
        config: ReconcilerConfig,
        queue: Arc<dyn TaskQueue>,
        catalog: Arc<dyn CatalogStore>,
        storage: Arc<dyn StorageBackend>,
        locator: Arc<dyn AssetLocator>,
    ) -> Self {
        Self {
            config,
            queue,
            catalog,
            storage,
            locator,
        }
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Drain every task currently in the queue once
    ///
    /// # Errors
    ///
    /// Returns the first non-recoverable error. Tasks processed before it
    /// stay processed; tasks after it stay queued.
    #[instrument(skip(self), fields(backend = %self.storage.describe()))]
    pub async fn run_pass(&self) -> Result<PassReport> {
        let batch = self.queue.load_pending().await?;

        let mut report = PassReport {
            discovered: batch.row_count(),
            rejected: batch.rejected().len(),
            ..PassReport::default()
        };

        info!(
            tasks = batch.len(),
            rejected = report.rejected,
            "Found pending CDN tasks"
        );

        for task in batch.tasks() {
            let span = info_span!("task", task_id = %task.id, operation = %task.operation);

            match self.process(task, &batch).instrument(span.clone()).await {
                Ok(outcome) => match outcome {
                    TaskOutcome::Copied => report.copied += 1,
                    TaskOutcome::Deleted => report.deleted += 1,
                    TaskOutcome::Skipped => report.skipped += 1,
                },
                Err(e) if e.is_recoverable() => {
                    span.in_scope(|| {
                        warn!(error = %e, "CDN task failed; it stays queued for the next run")
                    });
                    report.failed.push(TaskFailure {
                        task_id: task.id,
                        operation: task.operation,
                        error: e.to_string(),
                    });
                }
                Err(e) => {
                    span.in_scope(|| error!(error = %e, "CDN pass aborted"));
                    return Err(e);
                }
            }
        }

        info!(
            copied = report.copied,
            deleted = report.deleted,
            skipped = report.skipped,
            failed = report.failed.len(),
            rejected = report.rejected,
            "CDN pass complete"
        );

        Ok(report)
    }

    async fn process(&self, task: &TaskRecord, batch: &PendingBatch) -> Result<TaskOutcome> {
        let outcome = match task.operation {
            Operation::Copy => self.copy(task, batch).await?,
            Operation::Delete => self.delete(task, batch).await?,
        };

        if !self.queue.delete(task.id).await? {
            debug!("Task was already removed from the queue");
        }

        Ok(outcome)
    }

    async fn copy(&self, task: &TaskRecord, batch: &PendingBatch) -> Result<TaskOutcome> {
        let Some(asset) = batch.asset_for(task) else {
            debug!("Asset no longer exists; nothing to copy");
            return Ok(TaskOutcome::Skipped);
        };
        let variant = batch
            .variant(task.variant_id)
            .ok_or(SyncError::DanglingReference {
                task_id: task.id.0,
                entity: "variant",
                id: task.variant_id.0,
            })?;

        info!(asset_id = %asset.id, variant = %variant.shortname, "Copying rendition");

        let resolved = self
            .locator
            .resolve(asset, variant, &self.config.source_root)
            .await?;

        self.storage
            .put_object(&resolved.local_path, &resolved.remote_path, &resolved.mime_type)
            .await
            .map_err(|source| SyncError::BackendOperationFailed {
                operation: Operation::Copy,
                path: resolved.remote_path.clone(),
                source,
            })?;

        if !self
            .catalog
            .set_cdn_presence(asset.id, &variant.shortname, true)
            .await?
        {
            warn!(asset_id = %asset.id, variant = %variant.shortname, "Rendition vanished before it could be marked on-CDN");
        }

        info!(remote_path = %resolved.remote_path, "Copied");
        Ok(TaskOutcome::Copied)
    }

    async fn delete(&self, task: &TaskRecord, batch: &PendingBatch) -> Result<TaskOutcome> {
        if let Some(asset) = batch.asset_for(task) {
            let variant = batch
                .variant(task.variant_id)
                .ok_or(SyncError::DanglingReference {
                    task_id: task.id.0,
                    entity: "variant",
                    id: task.variant_id.0,
                })?;

            self.catalog
                .set_cdn_presence(asset.id, &variant.shortname, false)
                .await?;
            debug!(asset_id = %asset.id, variant = %variant.shortname, "Marked off-CDN");
        }

        if task.has_remote_path() {
            info!(remote_path = %task.remote_path, "Deleting CDN object");

            self.storage
                .delete_object(&task.remote_path)
                .await
                .map_err(|source| SyncError::BackendOperationFailed {
                    operation: Operation::Delete,
                    path: task.remote_path.clone(),
                    source,
                })?;

            info!(remote_path = %task.remote_path, "Deleted");
        } else {
            debug!("Task has no remote path; skipping backend delete");
        }

        Ok(TaskOutcome::Deleted)
    }
}
