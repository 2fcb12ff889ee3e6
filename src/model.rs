//! Wire and storage shapes for telemetry events
//!
//! A [`LogRecord`] is one event as emitted by a client, shipped inside a
//! [`LogBatch`] and persisted verbatim by the daemon.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

/// Severity levels ordered by rank
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
    Critical,
}

impl Level {
    /// Ordinal rank used for `min_level` comparisons
    pub fn rank(self) -> i64 {
        match self {
            Level::Debug => 0,
            Level::Info => 1,
            Level::Warn => 2,
            Level::Error => 3,
            Level::Critical => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Critical => "CRITICAL",
        }
    }

    /// Strict parse, case-insensitive. `WARNING` is accepted as `WARN`.
    pub fn parse(name: &str) -> Option<Level> {
        match name.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => Some(Level::Debug),
            "INFO" => Some(Level::Info),
            "WARN" | "WARNING" => Some(Level::Warn),
            "ERROR" => Some(Level::Error),
            "CRITICAL" => Some(Level::Critical),
            _ => None,
        }
    }

    /// Lenient parse: anything unrecognized ranks as DEBUG.
    pub fn parse_lenient(name: &str) -> Level {
        Self::parse(name).unwrap_or(Level::Debug)
    }

    /// Map a `tracing` level onto the pipeline's scale (TRACE folds into DEBUG)
    pub fn from_tracing(level: &tracing::Level) -> Level {
        match *level {
            tracing::Level::ERROR => Level::Error,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::INFO => Level::Info,
            _ => Level::Debug,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Level::parse(s).ok_or_else(|| {
            format!(
                "Invalid level '{}'. Valid levels: DEBUG, INFO, WARN, ERROR, CRITICAL",
                s
            )
        })
    }
}

/// One telemetry event
///
/// Required fields are non-optional so a payload missing any of them fails
/// deserialization and never reaches storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Seconds since the Unix epoch
    pub ts: f64,
    pub level: String,
    pub message: String,
    pub application_id: String,
    #[serde(default)]
    pub service_name: Option<String>,
    pub module_name: String,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub line_no: Option<i64>,
    #[serde(default)]
    pub exception_type: Option<String>,
    #[serde(default)]
    pub stacktrace: Option<String>,
    #[serde(default)]
    pub context: serde_json::Map<String, serde_json::Value>,
}

impl LogRecord {
    /// Minimal record stamped with the current time
    pub fn new(
        level: Level,
        message: impl Into<String>,
        application_id: impl Into<String>,
        module_name: impl Into<String>,
    ) -> Self {
        Self {
            ts: current_ts(),
            level: level.as_str().to_string(),
            message: message.into(),
            application_id: application_id.into(),
            service_name: None,
            module_name: module_name.into(),
            file_path: None,
            line_no: None,
            exception_type: None,
            stacktrace: None,
            context: serde_json::Map::new(),
        }
    }

    pub fn level_rank(&self) -> i64 {
        Level::parse_lenient(&self.level).rank()
    }

    /// Environment tag carried in `context.environment`, if any
    pub fn environment(&self) -> Option<&str> {
        self.context.get("environment").and_then(|v| v.as_str())
    }

    /// Semantic checks beyond what deserialization enforces
    pub fn validate(&self) -> Result<(), String> {
        if !self.ts.is_finite() {
            return Err("ts must be a finite number".to_string());
        }
        if self.application_id.trim().is_empty() {
            return Err("application_id must not be empty".to_string());
        }
        if self.module_name.trim().is_empty() {
            return Err("module_name must not be empty".to_string());
        }
        if self.level.trim().is_empty() {
            return Err("level must not be empty".to_string());
        }
        Ok(())
    }
}

/// Envelope used to ship records from a client to the daemon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogBatch {
    pub application_id: String,
    pub logs: Vec<LogRecord>,
}

impl LogBatch {
    /// Validate every record; the first failure rejects the whole batch.
    pub fn validate(&self) -> Result<(), String> {
        for (index, record) in self.logs.iter().enumerate() {
            record
                .validate()
                .map_err(|e| format!("logs[{}]: {}", index, e))?;
        }
        Ok(())
    }
}

/// Current wall-clock time as fractional Unix seconds
pub fn current_ts() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
