//! SQLite metadata store.
//!
//! Single source of truth for upload records, cache entries and jobs. All
//! mutations go through a single-connection writer pool so check-then-create
//! sequences are serialized without application-level mutexes; reads run on
//! a separate concurrent pool over the same WAL database.

pub mod error;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use store::{EntryPlan, GetOrCreateOutcome, MetadataStore};
