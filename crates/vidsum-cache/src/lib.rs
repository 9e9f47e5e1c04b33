//! Cache coordination.
//!
//! This crate provides:
//! - Cache-key derivation from normalized source identity and the profile
//!   version
//! - The coordinator: single-flight get-or-create, post-run updates,
//!   delete with in-flight cancellation, the startup sweep
//! - The GC janitor applying TTL and size budgets

pub mod config;
pub mod coordinator;
pub mod error;
pub mod janitor;
pub mod key;

pub use config::CacheConfig;
pub use coordinator::{CacheCoordinator, LocalSourceRef, LookupResult};
pub use error::{CacheError, CacheResult};
pub use janitor::CacheJanitor;
pub use key::{local_cache_key, url_cache_key};
