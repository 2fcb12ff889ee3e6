//! Query filters and their compiled, validated form

use regex::Regex;

use super::{Cursor, QueryError};
use crate::model::Level;

pub const DEFAULT_LIMIT: usize = 100;
pub const MAX_LIMIT: usize = 1000;
pub const MAX_WINDOW_HOURS: f64 = 24.0;
pub const MAX_PATTERN_LEN: usize = 500;

/// Scalar-or-set match on a name column
#[derive(Debug, Clone, PartialEq)]
pub enum NameFilter {
    Exact(String),
    /// Match any of the values; an empty set places no constraint
    AnyOf(Vec<String>),
}

impl NameFilter {
    /// Build from a query-string value; commas separate alternatives.
    pub fn from_param(raw: &str) -> Option<Self> {
        let values: Vec<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect();

        match values.len() {
            0 => None,
            1 => values.into_iter().next().map(NameFilter::Exact),
            _ => Some(NameFilter::AnyOf(values)),
        }
    }

    /// Values to bind in SQL, or `None` when the filter is unconstrained
    pub(crate) fn values(&self) -> Option<Vec<&str>> {
        match self {
            NameFilter::Exact(v) => Some(vec![v.as_str()]),
            NameFilter::AnyOf(values) if values.is_empty() => None,
            NameFilter::AnyOf(values) => Some(values.iter().map(String::as_str).collect()),
        }
    }
}

/// Conjunctive filter over a time window
#[derive(Debug, Clone)]
pub struct LogQuery {
    pub start_ts: f64,
    pub end_ts: f64,
    pub application_id: Option<String>,
    pub module_name: Option<NameFilter>,
    pub service_name: Option<NameFilter>,
    /// Case-insensitive substring match against `message`
    pub message_contains: Option<String>,
    pub message_regex: Option<String>,
    pub min_level: Option<Level>,
    pub after_cursor: Option<Cursor>,
    pub limit: usize,
    /// Permit windows wider than 24 hours
    pub allow_wide_window: bool,
}

impl Default for LogQuery {
    fn default() -> Self {
        Self {
            start_ts: 0.0,
            end_ts: 0.0,
            application_id: None,
            module_name: None,
            service_name: None,
            message_contains: None,
            message_regex: None,
            min_level: None,
            after_cursor: None,
            limit: DEFAULT_LIMIT,
            allow_wide_window: false,
        }
    }
}

impl LogQuery {
    pub fn window(start_ts: f64, end_ts: f64) -> Self {
        Self {
            start_ts,
            end_ts,
            ..Default::default()
        }
    }

    pub fn window_hours(&self) -> f64 {
        (self.end_ts - self.start_ts) / 3600.0
    }

    /// Validate and prepare for execution. No storage is touched here.
    pub fn compile(&self) -> Result<CompiledQuery, QueryError> {
        if !self.start_ts.is_finite() || !self.end_ts.is_finite() {
            return Err(QueryError::InvalidWindow(
                "start_ts and end_ts must be finite".to_string(),
            ));
        }
        if self.start_ts > self.end_ts {
            return Err(QueryError::InvalidWindow(format!(
                "start_ts {} is after end_ts {}",
                self.start_ts, self.end_ts
            )));
        }

        let hours = self.window_hours();
        if hours > MAX_WINDOW_HOURS && !self.allow_wide_window {
            return Err(QueryError::WindowTooWide { hours });
        }

        let regex = match &self.message_regex {
            Some(pattern) if pattern.len() > MAX_PATTERN_LEN => {
                return Err(QueryError::InvalidPattern(format!(
                    "Pattern too long (max {} characters)",
                    MAX_PATTERN_LEN
                )));
            }
            Some(pattern) => Some(
                Regex::new(pattern)
                    .map_err(|e| QueryError::InvalidPattern(format!("Invalid regex pattern: {}", e)))?,
            ),
            None => None,
        };

        let mut query = self.clone();
        query.limit = query.limit.min(MAX_LIMIT);

        Ok(CompiledQuery {
            query,
            needle: self.message_contains.as_ref().map(|s| s.to_lowercase()),
            regex,
        })
    }
}

/// A validated query ready for storage
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    query: LogQuery,
    needle: Option<String>,
    regex: Option<Regex>,
}

impl CompiledQuery {
    pub fn query(&self) -> &LogQuery {
        &self.query
    }

    pub fn limit(&self) -> usize {
        self.query.limit
    }

    /// Whether a row needs message checks that storage cannot push down
    pub fn has_message_filter(&self) -> bool {
        self.needle.is_some() || self.regex.is_some()
    }

    pub fn matches_message(&self, message: &str) -> bool {
        if let Some(needle) = &self.needle {
            if !message.to_lowercase().contains(needle.as_str()) {
                return false;
            }
        }
        if let Some(regex) = &self.regex {
            if !regex.is_match(message) {
                return false;
            }
        }
        true
    }
}
