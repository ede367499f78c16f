use std::sync::Arc;

use tracing::info;

use shared_config::{AppConfig, StorageBackend};

use crate::memory::MemoryStore;
use crate::postgrest::PostgrestStore;
use crate::store::TransactionalStore;

/// Shared router state: configuration plus the store every cell works against.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn TransactionalStore>,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, store: Arc<dyn TransactionalStore>) -> Self {
        Self { config, store }
    }

    pub fn from_config(config: AppConfig) -> Self {
        let store: Arc<dyn TransactionalStore> = match config.storage_backend {
            StorageBackend::Memory => {
                info!("Using in-memory storage backend");
                Arc::new(MemoryStore::new())
            }
            StorageBackend::Supabase => {
                info!("Using Supabase storage backend at {}", config.supabase_url);
                Arc::new(PostgrestStore::new(&config))
            }
        };

        Self::new(Arc::new(config), store)
    }
}
