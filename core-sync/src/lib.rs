//! # CDN Sync
//!
//! Reconciles the media catalog with the CDN by draining the `cdn_queue`
//! work queue.
//!
//! ## Components
//!
//! - **Tasks** (`task`): `TaskRecord`, `Operation`, `NewTask`
//! - **Queue** (`queue`): durable drain-all queue with batched catalog loading
//! - **Reconciler** (`reconciler`): applies one pass and returns a `PassReport`
//! - **Process lock** (`lock`): keeps concurrent updaters apart

pub mod error;
pub mod lock;
pub mod queue;
pub mod reconciler;
pub mod task;

pub use error::{Result, SyncError};
pub use lock::{LockGuard, LockInfo, ProcessLock};
pub use queue::{PendingBatch, RejectedTask, SqliteTaskQueue, TaskQueue};
pub use reconciler::{PassReport, Reconciler, ReconcilerConfig, TaskFailure};
pub use task::{NewTask, Operation, TaskId, TaskRecord};
