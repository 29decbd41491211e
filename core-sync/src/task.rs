//! CDN work items
//!
//! A [`TaskRecord`] is one pending "publish this rendition" or "remove this
//! object" instruction. Records exist only while work remains: they are
//! created by catalog writers, read by the reconciler, and deleted once
//! applied. They are never updated in place.

use crate::error::{Result, SyncError};
use core_catalog::{AssetId, VariantId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Queue-assigned task identifier
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(transparent)]
pub struct TaskId(pub i64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Operation a task asks the reconciler to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Upload the asset's variant to the CDN
    Copy,
    /// Remove an object from the CDN
    Delete,
}

impl Operation {
    /// Convert to the stored text representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Copy => "copy",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "copy" => Ok(Self::Copy),
            "delete" => Ok(Self::Delete),
            other => Err(SyncError::UnknownOperation(other.to_string())),
        }
    }
}

/// One outstanding unit of CDN work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    pub operation: Operation,
    /// `None` once the asset has been removed from the catalog
    pub asset_id: Option<AssetId>,
    pub variant_id: VariantId,
    /// Full object path on the CDN; may be empty for copy tasks
    pub remote_path: String,
    /// Unix timestamp when enqueued
    pub created_at: i64,
}

impl TaskRecord {
    /// Whether the task names a concrete remote object
    ///
    /// A blank path must never reach the backend's delete: it would address
    /// the bucket root.
    pub fn has_remote_path(&self) -> bool {
        !self.remote_path.trim().is_empty()
    }
}

/// Insert payload for the queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub operation: Operation,
    pub asset_id: Option<AssetId>,
    pub variant_id: VariantId,
    pub remote_path: String,
}

impl NewTask {
    /// Publish `variant` of `asset`
    pub fn copy(asset_id: AssetId, variant_id: VariantId) -> Self {
        Self {
            operation: Operation::Copy,
            asset_id: Some(asset_id),
            variant_id,
            remote_path: String::new(),
        }
    }

    /// Unpublish an object, optionally flagging the asset's variant off-CDN
    pub fn delete(
        asset_id: Option<AssetId>,
        variant_id: VariantId,
        remote_path: impl Into<String>,
    ) -> Self {
        Self {
            operation: Operation::Delete,
            asset_id,
            variant_id,
            remote_path: remote_path.into(),
        }
    }
}
