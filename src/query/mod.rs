//! Filtered, cursor-paginated retrieval
//!
//! [`QueryEngine`] validates a [`LogQuery`] up front, asks storage for one
//! row more than the page size, and turns the overflow into `has_more` and a
//! resumable [`Cursor`].

pub mod cursor;
pub mod filter;
pub mod time;

pub use cursor::{Cursor, CursorError};
pub use filter::{CompiledQuery, LogQuery, NameFilter, DEFAULT_LIMIT, MAX_LIMIT};
pub use time::parse_time_param;

use std::sync::Arc;
use thiserror::Error;

use crate::model::LogRecord;
use crate::storage::{LogStore, StoredRecord};

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Time window of {hours:.1} hours exceeds the 24 hour limit; narrow the window or request a full search")]
    WindowTooWide { hours: f64 },

    #[error("Invalid time window: {0}")]
    InvalidWindow(String),

    #[error("Invalid time parameter: {0}")]
    InvalidTime(String),

    #[error("{0}")]
    InvalidPattern(String),

    #[error(transparent)]
    InvalidCursor(#[from] CursorError),

    #[error("Storage error: {0:#}")]
    Storage(anyhow::Error),
}

/// One page of results, newest first
#[derive(Debug, Clone, Default)]
pub struct LogPage {
    pub records: Vec<LogRecord>,
    pub has_more: bool,
    pub next_cursor: Option<Cursor>,
}

impl LogPage {
    /// Trim an over-fetched, already ordered row set to `limit`.
    pub fn from_rows(mut rows: Vec<StoredRecord>, limit: usize) -> Self {
        let has_more = rows.len() > limit;
        rows.truncate(limit);

        let next_cursor = if has_more {
            rows.last().map(|row| Cursor::new(row.record.ts, row.id))
        } else {
            None
        };

        Self {
            records: rows.into_iter().map(|row| row.record).collect(),
            has_more,
            next_cursor,
        }
    }
}

#[derive(Clone)]
pub struct QueryEngine {
    store: Arc<dyn LogStore>,
}

impl QueryEngine {
    pub fn new(store: Arc<dyn LogStore>) -> Self {
        Self { store }
    }

    pub async fn run(&self, query: &LogQuery) -> Result<LogPage, QueryError> {
        let compiled = query.compile()?;
        let limit = compiled.limit();
        if limit == 0 {
            return Ok(LogPage::default());
        }

        let rows = self
            .store
            .query_time_range(&compiled, limit.saturating_add(1))
            .await
            .map_err(QueryError::Storage)?;

        tracing::debug!(
            start_ts = query.start_ts,
            end_ts = query.end_ts,
            rows = rows.len(),
            limit = limit,
            "Query executed"
        );

        Ok(LogPage::from_rows(rows, limit))
    }
}
