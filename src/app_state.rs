//! Application state shared across HTTP handlers.
//!
//! `AppState` coordinates exactly two things: the configuration loaded at
//! startup and a handle to the storage core. It holds no graph logic of its
//! own; every operation is a call into [`MentatSyncStorage`].

use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::storage::MentatSyncStorage;

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn MentatSyncStorage>,
    pub config: Config,
}

impl AppState {
    pub fn new(storage: Arc<dyn MentatSyncStorage>, config: Config) -> Self {
        AppState { storage, config }
    }

    /// Convenience constructor for tests: an in-memory SQLite backend with
    /// default configuration.
    pub async fn new_in_memory() -> Result<Self> {
        let storage = crate::storage::SqliteStorage::in_memory().await?;
        Ok(AppState { storage: Arc::new(storage), config: Config::default() })
    }
}
