//! SQLite-backed [`LogStore`]
//!
//! - WAL mode so queries never wait on the ingest writer
//! - Batch inserts in a single transaction
//! - Retention deletes in bounded chunks, each its own statement

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite};
use std::str::FromStr;
use std::time::Duration;

use super::{LogStore, StoredRecord};
use crate::model::{LogBatch, LogRecord};
use crate::query::{CompiledQuery, NameFilter};

const DEFAULT_DELETE_CHUNK: i64 = 5_000;

const SELECT_COLUMNS: &str = "SELECT id, ts, level, message, application_id, service_name, module_name, \
     file_path, line_no, exception_type, stacktrace, context FROM logs";

pub struct SqliteLogStore {
    pool: SqlitePool,
    delete_chunk: i64,
}

impl SqliteLogStore {
    /// Open (creating if missing) and migrate the database at `database_url`
    ///
    /// ```ignore
    /// let store = SqliteLogStore::new("sqlite:./data/logdock.db").await?;
    /// ```
    pub async fn new(database_url: &str) -> Result<Self> {
        let in_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");

        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database URL: {}", database_url))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(30))
            .pragma("cache_size", "-64000")
            .pragma("temp_store", "memory")
            .pragma("synchronous", "NORMAL");

        if !in_memory {
            if let Some(parent) = options.get_filename().parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).with_context(|| {
                        format!("Failed to create database directory {}", parent.display())
                    })?;
                }
            }
        }

        // Every connection to an in-memory database sees its own empty database
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await
            .context("Failed to connect to log database")?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("Failed to run log database migrations")?;

        tracing::info!(database_url = %database_url, "Log database ready");

        Ok(Self {
            pool,
            delete_chunk: DEFAULT_DELETE_CHUNK,
        })
    }

    /// Override how many rows one retention DELETE statement may remove
    pub fn with_delete_chunk(mut self, chunk: i64) -> Self {
        self.delete_chunk = chunk.max(1);
        self
    }
}

fn push_name_filter(qb: &mut QueryBuilder<'_, Sqlite>, column: &str, filter: &Option<NameFilter>) {
    let Some(values) = filter.as_ref().and_then(NameFilter::values) else {
        return;
    };

    qb.push(format!(" AND {} IN (", column));
    let mut separated = qb.separated(", ");
    for value in values {
        separated.push_bind(value.to_string());
    }
    separated.push_unseparated(")");
}

fn row_to_stored(row: &SqliteRow) -> Result<StoredRecord> {
    let id: i64 = row.try_get("id")?;
    let context_json: String = row.try_get("context")?;
    let context = serde_json::from_str(&context_json)
        .with_context(|| format!("Corrupt context JSON in log {}", id))?;

    Ok(StoredRecord {
        id,
        record: LogRecord {
            ts: row.try_get("ts")?,
            level: row.try_get("level")?,
            message: row.try_get("message")?,
            application_id: row.try_get("application_id")?,
            service_name: row.try_get("service_name")?,
            module_name: row.try_get("module_name")?,
            file_path: row.try_get("file_path")?,
            line_no: row.try_get("line_no")?,
            exception_type: row.try_get("exception_type")?,
            stacktrace: row.try_get("stacktrace")?,
            context,
        },
    })
}

#[async_trait]
impl LogStore for SqliteLogStore {
    async fn write_batch(&self, batch: &LogBatch) -> Result<u64> {
        if batch.logs.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        for log in &batch.logs {
            let context = serde_json::to_string(&log.context)?;
            sqlx::query(
                "INSERT INTO logs (ts, level, level_rank, message, application_id, service_name,
                                   module_name, file_path, line_no, exception_type, stacktrace, context)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(log.ts)
            .bind(&log.level)
            .bind(log.level_rank())
            .bind(&log.message)
            .bind(&log.application_id)
            .bind(&log.service_name)
            .bind(&log.module_name)
            .bind(&log.file_path)
            .bind(log.line_no)
            .bind(&log.exception_type)
            .bind(&log.stacktrace)
            .bind(context)
            .execute(&mut *tx)
            .await
            .context("Failed to insert log record")?;
        }

        tx.commit().await.context("Failed to commit log batch")?;

        Ok(batch.logs.len() as u64)
    }

    async fn query_time_range(&self, compiled: &CompiledQuery, fetch: usize) -> Result<Vec<StoredRecord>> {
        let q = compiled.query();

        let mut qb: QueryBuilder<'_, Sqlite> = QueryBuilder::new(SELECT_COLUMNS);
        qb.push(" WHERE ts >= ").push_bind(q.start_ts);
        qb.push(" AND ts <= ").push_bind(q.end_ts);

        if let Some(app) = &q.application_id {
            qb.push(" AND application_id = ").push_bind(app.clone());
        }
        push_name_filter(&mut qb, "module_name", &q.module_name);
        push_name_filter(&mut qb, "service_name", &q.service_name);

        if let Some(level) = q.min_level {
            qb.push(" AND level_rank >= ").push_bind(level.rank());
        }

        if let Some(cursor) = &q.after_cursor {
            qb.push(" AND (ts < ")
                .push_bind(cursor.ts())
                .push(" OR (ts = ")
                .push_bind(cursor.ts())
                .push(" AND id < ")
                .push_bind(cursor.id())
                .push("))");
        }

        qb.push(" ORDER BY ts DESC, id DESC");

        // Message predicates run here, so only bound the scan when there are none
        if !compiled.has_message_filter() {
            qb.push(" LIMIT ").push_bind(i64::try_from(fetch).unwrap_or(i64::MAX));
        }

        let mut results = Vec::with_capacity(fetch.min(1024));
        let mut rows = qb.build().fetch(&self.pool);
        while let Some(row) = rows.try_next().await.context("Failed to query logs")? {
            let stored = row_to_stored(&row)?;
            if !compiled.matches_message(&stored.record.message) {
                continue;
            }
            results.push(stored);
            if results.len() >= fetch {
                break;
            }
        }

        Ok(results)
    }

    async fn delete_older_than(&self, cutoff: f64) -> Result<u64> {
        let mut total = 0u64;

        loop {
            let result = sqlx::query(
                "DELETE FROM logs WHERE id IN (SELECT id FROM logs WHERE ts < ? LIMIT ?)",
            )
            .bind(cutoff)
            .bind(self.delete_chunk)
            .execute(&self.pool)
            .await
            .context("Failed to delete expired logs")?;

            let deleted = result.rows_affected();
            total += deleted;
            if deleted < self.delete_chunk as u64 {
                break;
            }

            // Let queued ingest transactions in between chunks
            tokio::task::yield_now().await;
        }

        Ok(total)
    }

    async fn delete_by_application(&self, application_id: &str, environment: Option<&str>) -> Result<u64> {
        let result = match environment {
            Some(env) => {
                sqlx::query(
                    "DELETE FROM logs
                     WHERE application_id = ? AND json_extract(context, '$.environment') = ?",
                )
                .bind(application_id)
                .bind(env)
                .execute(&self.pool)
                .await
            }
            None => {
                sqlx::query("DELETE FROM logs WHERE application_id = ?")
                    .bind(application_id)
                    .execute(&self.pool)
                    .await
            }
        }
        .context("Failed to clear application logs")?;

        Ok(result.rows_affected())
    }

    async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM logs")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count logs")?;

        Ok(count as u64)
    }
}
