//! On-disk stores.
//!
//! This crate provides:
//! - The streaming upload store: bounded ingestion, type/size gates,
//!   content-hash dedup, TTL reaping
//! - The bundle store: per-job staging directories and atomic promotion
//!   into the committed cache layout

pub mod bundle;
pub mod error;
pub mod fs;
pub mod upload;

pub use bundle::BundleStore;
pub use error::{StorageError, StorageResult};
pub use upload::{sanitize_file_name, UploadConfig, UploadStore};
