//! `GET /logs/query` and `POST /logs/clear`

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::AppState;
use crate::error::AppError;
use crate::metrics;
use crate::model::{Level, LogRecord};
use crate::query::{parse_time_param, Cursor, LogQuery, NameFilter, QueryError, DEFAULT_LIMIT, MAX_LIMIT};

/// Window used when neither `since` nor `start_ts` is given
const DEFAULT_LOOKBACK_SECS: f64 = 300.0;

/// Query parameters for `GET /logs/query`
///
/// `since`/`until` take precedence over `start_ts`/`end_ts`.
#[derive(Debug, Default, Deserialize)]
pub struct LogQueryParams {
    pub start_ts: Option<f64>,
    pub end_ts: Option<f64>,
    /// Relative (`5m`), ISO-8601 or unix seconds
    pub since: Option<String>,
    pub until: Option<String>,
    pub application_id: Option<String>,
    /// Comma-separated for any-of
    pub module_name: Option<String>,
    pub service_name: Option<String>,
    pub message_contains: Option<String>,
    pub message_regex: Option<String>,
    pub min_level: Option<String>,
    #[serde(alias = "cursor")]
    pub after_cursor: Option<String>,
    pub limit: Option<i64>,
    #[serde(default)]
    pub full_search: bool,
}

#[derive(Debug, Serialize)]
pub struct LogsResponse {
    pub results: Vec<LogRecord>,
    pub count: usize,
    pub has_more: bool,
    pub next_cursor: Option<String>,
}

impl LogQueryParams {
    /// Resolve times, levels and the cursor into an engine query
    pub fn into_query(self) -> Result<LogQuery, AppError> {
        let now = Utc::now();
        let now_ts = now.timestamp_micros() as f64 / 1_000_000.0;

        let start_ts = match (&self.since, self.start_ts) {
            (Some(since), _) => parse_time_param(since, false, now)?,
            (None, Some(ts)) => ts,
            (None, None) => now_ts - DEFAULT_LOOKBACK_SECS,
        };
        let end_ts = match (&self.until, self.end_ts) {
            (Some(until), _) => parse_time_param(until, true, now)?,
            (None, Some(ts)) => ts,
            (None, None) => now_ts,
        };

        let min_level = match self.min_level.as_deref().filter(|l| !l.trim().is_empty()) {
            Some(raw) => Some(Level::parse(raw).ok_or_else(|| {
                AppError::InvalidLevel(format!(
                    "Invalid min_level '{}'. Valid levels: DEBUG, INFO, WARN, ERROR, CRITICAL",
                    raw
                ))
            })?),
            None => None,
        };

        let after_cursor = match self.after_cursor.as_deref().filter(|c| !c.is_empty()) {
            Some(token) => Some(Cursor::decode(token).map_err(QueryError::from)?),
            None => None,
        };

        let limit = match self.limit {
            None => DEFAULT_LIMIT,
            Some(n) if (1..=MAX_LIMIT as i64).contains(&n) => n as usize,
            Some(n) => {
                return Err(AppError::InvalidQuery {
                    kind: "invalid_limit",
                    message: format!("limit must be between 1 and {}, got {}", MAX_LIMIT, n),
                })
            }
        };

        Ok(LogQuery {
            start_ts,
            end_ts,
            application_id: self.application_id.filter(|a| !a.is_empty()),
            module_name: self.module_name.as_deref().and_then(NameFilter::from_param),
            service_name: self.service_name.as_deref().and_then(NameFilter::from_param),
            message_contains: self.message_contains.filter(|m| !m.is_empty()),
            message_regex: self.message_regex.filter(|m| !m.is_empty()),
            min_level,
            after_cursor,
            limit,
            allow_wide_window: self.full_search,
        })
    }
}

pub async fn query_logs(
    State(state): State<AppState>,
    params: Result<Query<LogQueryParams>, QueryRejection>,
) -> Result<Json<LogsResponse>, AppError> {
    let Query(params) = params.map_err(|e| AppError::InvalidQuery {
        kind: "invalid_params",
        message: e.body_text(),
    })?;
    let query = params.into_query()?;

    let started = Instant::now();
    let page = state.engine.run(&query).await?;
    metrics::record_query_duration(started.elapsed());

    Ok(Json(LogsResponse {
        count: page.records.len(),
        has_more: page.has_more,
        next_cursor: page.next_cursor.map(|c| c.encode()),
        results: page.records,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ClearParams {
    pub application_id: Option<String>,
    pub environment: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub deleted: u64,
}

/// Delete one application's records, optionally only one environment's
pub async fn clear_logs(
    State(state): State<AppState>,
    Query(params): Query<ClearParams>,
) -> Result<Json<ClearResponse>, AppError> {
    let application_id = params
        .application_id
        .filter(|a| !a.trim().is_empty())
        .ok_or_else(|| AppError::Validation("application_id is required".to_string()))?;
    let environment = params.environment.filter(|e| !e.is_empty());

    let deleted = state
        .store
        .delete_by_application(&application_id, environment.as_deref())
        .await?;

    tracing::info!(
        application_id = %application_id,
        environment = environment.as_deref().unwrap_or("*"),
        deleted,
        "Logs cleared"
    );

    Ok(Json(ClearResponse { deleted }))
}
