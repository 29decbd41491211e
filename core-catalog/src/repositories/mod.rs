//! # Catalog repositories
//!
//! - `AssetRepository` - assets and their per-variant renditions
//! - `VariantRepository` - named renditions shared by all assets
//! - `CatalogStore` - the narrow view the reconciler needs: batched lookup
//!   plus the on-CDN flag write
//!
//! SQLite implementations use sqlx and share one pool.

pub mod asset;
pub mod catalog;
pub mod variant;

pub use asset::{AssetRepository, SqliteAssetRepository};
pub use catalog::{CatalogStore, SqliteCatalogStore};
pub use variant::{SqliteVariantRepository, VariantRepository};

/// Maximum number of ids bound into a single `IN (...)` clause
///
/// Stays well below SQLite's host parameter limit; a queue larger than this
/// costs one extra round-trip per chunk.
pub(crate) const BIND_CHUNK_SIZE: usize = 10_000;
