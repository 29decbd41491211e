//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the CDN updater:
//! - Logging and tracing infrastructure
//! - Configuration management
//!
//! ## Overview
//!
//! Every other crate receives its settings from here as explicit values;
//! there is no process-wide mutable configuration.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{CdnConfig, CdnConfigBuilder, ConfigFile, S3Target, StorageTarget};
pub use error::{Error, Result};
