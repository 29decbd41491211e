//! # Host Bridge Traits
//!
//! Contracts that the CDN updater core consumes but does not implement.
//!
//! ## Overview
//!
//! The reconciliation engine talks to the outside world through a small set of
//! traits so that concrete adapters (S3, a local mirror directory, test doubles)
//! can be swapped without touching the core.
//!
//! ## Traits
//!
//! - [`StorageBackend`](storage::StorageBackend) - Put/delete objects on the remote CDN
//!
//! ## Implementations
//!
//! | Backend | Implementation Crate | Feature |
//! |---------|---------------------|---------|
//! | Amazon S3 / S3-compatible | `bridge-desktop` | `s3` (default) |
//! | Local mirror directory | `bridge-desktop` | always |
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Adapters
//! should:
//!
//! - Convert SDK-specific errors to `BridgeError`
//! - Include the object key in the error so failures can be traced to a task
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds so they can be shared behind
//! `Arc` across async tasks.

pub mod error;
pub mod storage;

pub use error::BridgeError;
pub use storage::{normalize_key, StorageBackend};

#[cfg(test)]
pub use storage::MockStorageBackend;
