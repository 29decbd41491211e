//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for server and desktop hosts.
//!
//! ## Overview
//!
//! This crate provides production-ready implementations of the storage bridge:
//! - `StorageBackend` for Amazon S3 using `aws-sdk-s3`
//! - `StorageBackend` mirroring into a local directory using `tokio::fs`
//!
//! ## Feature Flags
//!
//! - `s3`: Enable the S3 backend (default)
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{LocalMirrorBackend, S3Settings, S3StorageBackend};
//!
//! #[tokio::main]
//! async fn main() {
//!     let s3 = S3StorageBackend::connect(S3Settings {
//!         bucket: "media".to_string(),
//!         ..Default::default()
//!     })
//!     .await;
//!     let mirror = LocalMirrorBackend::new("/srv/cdn-mirror");
//! }
//! ```

mod mirror;

#[cfg(feature = "s3")]
mod s3;

pub use mirror::LocalMirrorBackend;

#[cfg(feature = "s3")]
pub use s3::{S3Settings, S3StorageBackend};
