//! Application state.

use vidsum_cache::CacheCoordinator;
use vidsum_store::MetadataStore;
use vidsum_storage::UploadStore;

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub store: MetadataStore,
    pub uploads: UploadStore,
    pub coordinator: CacheCoordinator,
}

impl AppState {
    pub fn new(
        config: ApiConfig,
        store: MetadataStore,
        uploads: UploadStore,
        coordinator: CacheCoordinator,
    ) -> Self {
        Self {
            config,
            store,
            uploads,
            coordinator,
        }
    }
}
