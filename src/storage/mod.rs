//! Durable record store
//!
//! [`LogStore`] is the seam between the HTTP layer, the query engine and
//! retention; [`SqliteLogStore`] is the production implementation.

mod sqlite;

pub use sqlite::SqliteLogStore;

use anyhow::Result;
use async_trait::async_trait;

use crate::model::{current_ts, LogBatch, LogRecord};
use crate::query::CompiledQuery;

pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// A persisted record together with its storage row id
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub id: i64,
    pub record: LogRecord,
}

#[async_trait]
pub trait LogStore: Send + Sync {
    /// Persist every record of the batch or none of them
    async fn write_batch(&self, batch: &LogBatch) -> Result<u64>;

    /// Rows matching `query` in `ts DESC, id DESC` order, at most `fetch` of them
    async fn query_time_range(&self, query: &CompiledQuery, fetch: usize) -> Result<Vec<StoredRecord>>;

    /// Remove rows with `ts < cutoff`; returns how many were removed
    async fn delete_older_than(&self, cutoff: f64) -> Result<u64>;

    /// Remove an application's rows, optionally only those tagged with `environment`
    async fn delete_by_application(&self, application_id: &str, environment: Option<&str>) -> Result<u64>;

    async fn count(&self) -> Result<u64>;

    fn get_retention_cutoff(&self, days: i64) -> f64 {
        retention_cutoff_at(current_ts(), days)
    }
}

/// `now - days` in seconds; negative retention is treated as zero.
pub fn retention_cutoff_at(now: f64, days: i64) -> f64 {
    now - days.max(0) as f64 * SECONDS_PER_DAY
}
