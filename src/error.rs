use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

use crate::query::QueryError;

/// Errors surfaced at the HTTP boundary
#[derive(Debug)]
pub enum AppError {
    /// Malformed or incomplete ingest payload
    Validation(String),
    /// Unrecognized `min_level`
    InvalidLevel(String),
    /// Query rejected before execution
    InvalidQuery { kind: &'static str, message: String },
    /// Persistence failure
    Storage(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(msg) => write!(f, "Validation error: {}", msg),
            Self::InvalidLevel(msg) => write!(f, "Invalid level: {}", msg),
            Self::InvalidQuery { message, .. } => write!(f, "Invalid query: {}", message),
            Self::Storage(msg) => write!(f, "Storage error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            Self::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::InvalidLevel(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::InvalidQuery { message, .. } => (StatusCode::BAD_REQUEST, message.clone()),
            Self::Storage(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = Json(json!({
            "error": {
                "message": error_message,
                "type": error_type_name(&self),
            }
        }));

        (status, body).into_response()
    }
}

fn error_type_name(error: &AppError) -> &'static str {
    match error {
        AppError::Validation(_) => "validation_error",
        AppError::InvalidLevel(_) => "invalid_level",
        AppError::InvalidQuery { kind, .. } => kind,
        AppError::Storage(_) => "storage_error",
    }
}

impl From<QueryError> for AppError {
    fn from(err: QueryError) -> Self {
        let kind = match &err {
            QueryError::WindowTooWide { .. } => "window_too_wide",
            QueryError::InvalidWindow(_) => "invalid_window",
            QueryError::InvalidTime(_) => "invalid_time",
            QueryError::InvalidPattern(_) => "invalid_pattern",
            QueryError::InvalidCursor(_) => "invalid_cursor",
            QueryError::Storage(e) => return Self::Storage(format!("{:#}", e)),
        };
        Self::InvalidQuery {
            kind,
            message: err.to_string(),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Storage(format!("{:#}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Validation(format!("Invalid JSON payload: {}", err))
    }
}
