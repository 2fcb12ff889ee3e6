//! Human-friendly time parameters for the query API
//!
//! Accepted forms: relative (`30s`, `5m`, `1h`, `2d`), ISO 8601 with or
//! without an offset (naive values are UTC), or Unix seconds.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use regex::Regex;
use std::sync::OnceLock;

use super::QueryError;

fn relative_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^(\d+)([smhd])$").expect("relative time pattern is valid")
    })
}

/// Parse a time parameter into Unix seconds relative to `now`.
///
/// When `is_end` is set and the value is a whole Unix second, the result is
/// pushed to the end of that second so the bound stays inclusive.
pub fn parse_time_param(value: &str, is_end: bool, now: DateTime<Utc>) -> Result<f64, QueryError> {
    let value = value.trim();

    if let Some(caps) = relative_pattern().captures(value) {
        let amount: i64 = caps[1]
            .parse()
            .map_err(|_| QueryError::InvalidTime(value.to_string()))?;
        let delta = match caps[2].to_ascii_lowercase().as_str() {
            "s" => Duration::try_seconds(amount),
            "m" => Duration::try_minutes(amount),
            "h" => Duration::try_hours(amount),
            _ => Duration::try_days(amount),
        }
        .ok_or_else(|| QueryError::InvalidTime(value.to_string()))?;

        return now
            .checked_sub_signed(delta)
            .map(to_unix)
            .ok_or_else(|| QueryError::InvalidTime(value.to_string()));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(to_unix(dt.with_timezone(&Utc)));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(to_unix(naive.and_utc()));
        }
    }

    if let Ok(ts) = value.parse::<f64>() {
        if ts.is_finite() {
            if is_end && ts.fract() == 0.0 {
                return Ok(ts + 0.999999);
            }
            return Ok(ts);
        }
    }

    Err(QueryError::InvalidTime(value.to_string()))
}

fn to_unix(dt: DateTime<Utc>) -> f64 {
    dt.timestamp() as f64 + f64::from(dt.timestamp_subsec_micros()) / 1_000_000.0
}
