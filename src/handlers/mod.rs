pub mod ingest;
pub mod logs;
pub mod metrics_handler;
pub mod status;

use std::sync::Arc;

use crate::config::DaemonConfig;
use crate::query::QueryEngine;
use crate::storage::LogStore;

/// Shared state for the daemon's routes
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn LogStore>,
    pub engine: QueryEngine,
    pub config: Arc<DaemonConfig>,
}

impl AppState {
    pub fn new(store: Arc<dyn LogStore>, config: DaemonConfig) -> Self {
        Self {
            engine: QueryEngine::new(store.clone()),
            store,
            config: Arc::new(config),
        }
    }
}
