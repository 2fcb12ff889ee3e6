//! `POST /logs/ingest`

use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use serde::Serialize;
use tracing::{debug, warn};

use super::AppState;
use crate::error::AppError;
use crate::metrics;
use crate::model::{current_ts, LogBatch};

/// Records further ahead of the daemon clock than this are suspicious
const FUTURE_SKEW_SECS: f64 = 300.0;
/// Records older than this at ingest time are suspicious
const STALE_AGE_SECS: f64 = 86_400.0;

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub accepted: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TimestampWarning {
    Future { ts: f64, ahead_secs: f64 },
    Stale { ts: f64, behind_secs: f64 },
    Identical { ts: f64, count: usize },
}

/// Clock-skew heuristics; these never reject a batch
pub fn inspect_timestamps(batch: &LogBatch, now: f64) -> Vec<TimestampWarning> {
    let mut warnings = Vec::new();

    for record in &batch.logs {
        if record.ts > now + FUTURE_SKEW_SECS {
            warnings.push(TimestampWarning::Future {
                ts: record.ts,
                ahead_secs: record.ts - now,
            });
        }
        if record.ts < now - STALE_AGE_SECS {
            warnings.push(TimestampWarning::Stale {
                ts: record.ts,
                behind_secs: now - record.ts,
            });
        }
    }

    if let Some(first) = batch.logs.first() {
        if batch.logs.len() > 1 && batch.logs.iter().all(|r| r.ts == first.ts) {
            warnings.push(TimestampWarning::Identical {
                ts: first.ts,
                count: batch.logs.len(),
            });
        }
    }

    warnings
}

/// Validate and persist a batch. Any invalid record rejects the whole batch.
pub async fn ingest_logs(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<IngestResponse>), AppError> {
    let batch: LogBatch = match serde_json::from_slice(&body) {
        Ok(batch) => batch,
        Err(e) => {
            metrics::record_ingest_rejected();
            return Err(e.into());
        }
    };

    if let Err(message) = batch.validate() {
        metrics::record_ingest_rejected();
        return Err(AppError::Validation(message));
    }

    for warning in inspect_timestamps(&batch, current_ts()) {
        match warning {
            TimestampWarning::Future { ts, ahead_secs } => {
                warn!(application_id = %batch.application_id, ts, ahead_secs, "Log timestamp is in the future")
            }
            TimestampWarning::Stale { ts, behind_secs } => {
                warn!(application_id = %batch.application_id, ts, behind_secs, "Log timestamp is more than a day old")
            }
            TimestampWarning::Identical { ts, count } => {
                warn!(application_id = %batch.application_id, ts, count, "All logs in batch share one timestamp")
            }
        }
    }

    let accepted = state.store.write_batch(&batch).await?;
    metrics::record_ingested(&batch.application_id, accepted);
    debug!(application_id = %batch.application_id, accepted, "Batch ingested");

    Ok((
        StatusCode::ACCEPTED,
        Json(IngestResponse {
            accepted: batch.logs.len(),
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Level, LogRecord};

    fn batch_at(timestamps: &[f64]) -> LogBatch {
        LogBatch {
            application_id: "app".to_string(),
            logs: timestamps
                .iter()
                .map(|&ts| {
                    let mut record = LogRecord::new(Level::Info, "hello", "app", "main");
                    record.ts = ts;
                    record
                })
                .collect(),
        }
    }

    #[test]
    fn test_fresh_batch_has_no_warnings() {
        let now = 1_700_000_000.0;
        assert!(inspect_timestamps(&batch_at(&[now - 1.0, now]), now).is_empty());
        assert!(inspect_timestamps(&batch_at(&[now]), now).is_empty());
    }

    #[test]
    fn test_future_and_stale() {
        let now = 1_700_000_000.0;
        let warnings = inspect_timestamps(&batch_at(&[now + 600.0, now - 2.0 * 86_400.0]), now);
        assert_eq!(
            warnings,
            vec![
                TimestampWarning::Future {
                    ts: now + 600.0,
                    ahead_secs: 600.0
                },
                TimestampWarning::Stale {
                    ts: now - 172_800.0,
                    behind_secs: 172_800.0
                },
            ]
        );
    }

    #[test]
    fn test_identical_timestamps() {
        let now = 1_700_000_000.0;
        let warnings = inspect_timestamps(&batch_at(&[now, now, now]), now);
        assert_eq!(warnings, vec![TimestampWarning::Identical { ts: now, count: 3 }]);
    }
}
