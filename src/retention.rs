//! Age-based expiry of stored records
//!
//! A pass computes the cutoff from the configured retention period and
//! removes every record older than it. Passes run on demand or on an
//! interval in the background.

use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;

use crate::config::RetentionConfig;
use crate::storage::LogStore;

/// Outcome of one retention pass
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RetentionStats {
    pub retention_days: u32,
    pub cutoff: f64,
    pub deleted: u64,
}

#[derive(Clone)]
pub struct RetentionManager {
    store: Arc<dyn LogStore>,
    config: RetentionConfig,
}

impl RetentionManager {
    pub fn new(store: Arc<dyn LogStore>, config: RetentionConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> RetentionConfig {
        self.config
    }

    /// Run one pass immediately
    pub async fn run_now(&self) -> Result<RetentionStats> {
        let days = self.config.days();
        let cutoff = self.store.get_retention_cutoff(i64::from(days));
        let deleted = self.store.delete_older_than(cutoff).await?;

        crate::metrics::record_retention_deleted(deleted);
        tracing::info!(
            retention_days = days,
            cutoff = cutoff,
            deleted = deleted,
            "Retention pass completed"
        );

        Ok(RetentionStats {
            retention_days: days,
            cutoff,
            deleted,
        })
    }
}

/// Spawn the periodic retention task
///
/// The first pass runs immediately; failures are logged and retried on the
/// next tick.
pub fn spawn_retention_task(manager: RetentionManager, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        retention_loop(manager, every).await;
    })
}

async fn retention_loop(manager: RetentionManager, every: Duration) {
    let mut interval = time::interval(every);
    interval.set_missed_tick_behavior(time::MissedTickBehavior::Skip);

    loop {
        interval.tick().await;

        if let Err(e) = manager.run_now().await {
            tracing::error!(
                error = %e,
                retention_days = manager.config.days(),
                "Retention pass failed"
            );
        }
    }
}
