//! # Media Catalog
//!
//! Owns the catalog database: assets, the variants they are rendered in, and
//! which renditions are currently published to the CDN.
//!
//! - SQLite pool with embedded migrations ([`db`])
//! - Repository traits with SQLite implementations ([`repositories`])
//! - Local file / remote path resolution ([`locator`])

pub mod db;
pub mod error;
pub mod locator;
pub mod models;
pub mod repositories;

pub use error::{CatalogError, Result};
pub use locator::{AssetLocator, FileSystemAssetLocator, ResolvedAsset};
pub use models::{Asset, AssetId, NewRendition, Rendition, Variant, VariantId};
pub use repositories::{
    AssetRepository, CatalogStore, SqliteAssetRepository, SqliteCatalogStore,
    SqliteVariantRepository, VariantRepository,
};
