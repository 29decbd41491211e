use crate::task::Operation;
use bridge_traits::BridgeError;
use core_catalog::CatalogError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Local file missing: {}", path.display())]
    LocalFileMissing { path: PathBuf },

    #[error("CDN {operation} failed for '{path}': {source}")]
    BackendOperationFailed {
        operation: Operation,
        path: String,
        #[source]
        source: BridgeError,
    },

    #[error("Another update is already running (lock {}{})", path.display(), holder_suffix(holder))]
    LockContention {
        path: PathBuf,
        holder: Option<String>,
    },

    #[error("Lock file {} unusable: {source}", path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Task {task_id} references missing {entity} {id}")]
    DanglingReference {
        task_id: i64,
        entity: &'static str,
        id: i64,
    },

    #[error("Unknown task operation: {0}")]
    UnknownOperation(String),

    #[error("Catalog error: {0}")]
    Catalog(CatalogError),

    #[error("Database error: {0}")]
    Database(String),
}

fn holder_suffix(holder: &Option<String>) -> String {
    holder
        .as_deref()
        .map(|h| format!(", held by {h}"))
        .unwrap_or_default()
}

impl SyncError {
    /// Whether the pass may log this and continue with the next task
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::LocalFileMissing { .. } | Self::BackendOperationFailed { .. }
        )
    }
}

impl From<CatalogError> for SyncError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::FileNotFound { path } => Self::LocalFileMissing { path },
            other => Self::Catalog(other),
        }
    }
}

impl From<sqlx::Error> for SyncError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        let missing = SyncError::LocalFileMissing {
            path: PathBuf::from("/srv/media/images/200w/42.jpg"),
        };
        assert!(missing.is_recoverable());

        let backend = SyncError::BackendOperationFailed {
            operation: Operation::Delete,
            path: "images/42/200w.jpg".to_string(),
            source: BridgeError::OperationFailed("503".to_string()),
        };
        assert!(backend.is_recoverable());

        let contention = SyncError::LockContention {
            path: PathBuf::from("/run/cdn-updater.lock"),
            holder: None,
        };
        assert!(!contention.is_recoverable());
        assert!(!SyncError::Database("locked".to_string()).is_recoverable());
        assert!(!SyncError::DanglingReference {
            task_id: 1,
            entity: "variant",
            id: 9
        }
        .is_recoverable());
    }

    #[test]
    fn test_catalog_file_not_found_becomes_local_file_missing() {
        let err: SyncError = CatalogError::FileNotFound {
            path: PathBuf::from("/tmp/a.jpg"),
        }
        .into();
        assert!(matches!(err, SyncError::LocalFileMissing { .. }));

        let err: SyncError = CatalogError::RenditionNotFound {
            asset_id: 1,
            variant: "thumb".to_string(),
        }
        .into();
        assert!(matches!(err, SyncError::Catalog(_)));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_lock_contention_message_names_holder() {
        let err = SyncError::LockContention {
            path: PathBuf::from("/run/cdn-updater.lock"),
            holder: Some("pid 4242".to_string()),
        };
        assert!(err.to_string().contains("held by pid 4242"));
    }
}
