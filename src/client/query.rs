//! Client-side helper for `GET /logs/query`

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use super::{ClientError, DaemonHealth};
use crate::model::{Level, LogRecord};

pub const MAX_HOURS_WITHOUT_FULL_SEARCH: u64 = 24;
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct QueryRequest {
    /// Look back this many hours from now
    pub hours: u64,
    /// Lift the 24 hour guard
    pub full_search: bool,
    pub application_id: Option<String>,
    pub service_name: Option<String>,
    pub module_name: Option<String>,
    pub pattern: Option<String>,
    pub message_regex: Option<String>,
    pub min_level: Option<Level>,
    pub limit: Option<usize>,
    pub cursor: Option<String>,
}

impl Default for QueryRequest {
    fn default() -> Self {
        Self {
            hours: 1,
            full_search: false,
            application_id: None,
            service_name: None,
            module_name: None,
            pattern: None,
            message_regex: None,
            min_level: None,
            limit: None,
            cursor: None,
        }
    }
}

impl QueryRequest {
    pub fn check_window(&self) -> Result<(), ClientError> {
        if self.hours > MAX_HOURS_WITHOUT_FULL_SEARCH && !self.full_search {
            return Err(ClientError::WindowTooWide { hours: self.hours });
        }
        Ok(())
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("since", format!("{}h", self.hours))];
        let optional = [
            ("application_id", self.application_id.clone()),
            ("service_name", self.service_name.clone()),
            ("module_name", self.module_name.clone()),
            ("message_contains", self.pattern.clone()),
            ("message_regex", self.message_regex.clone()),
            ("min_level", self.min_level.map(|l| l.as_str().to_string())),
            ("limit", self.limit.map(|l| l.to_string())),
            ("after_cursor", self.cursor.clone()),
        ];
        params.extend(optional.into_iter().filter_map(|(k, v)| v.map(|v| (k, v))));
        if self.full_search {
            params.push(("full_search", "true".to_string()));
        }
        params
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub results: Vec<LogRecord>,
    pub count: usize,
    pub has_more: bool,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

pub struct QueryClient {
    health: DaemonHealth,
    client: reqwest::Client,
}

impl QueryClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_timeout(base_url, DEFAULT_QUERY_TIMEOUT)
    }

    /// `timeout` bounds the whole `/logs/query` request, body included
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        Ok(Self {
            health: DaemonHealth::new(base_url)?,
            client: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }

    pub fn health(&self) -> &DaemonHealth {
        &self.health
    }

    /// Window guard first, then the health probe, then the query itself
    pub async fn query(&self, request: &QueryRequest) -> Result<QueryResponse, ClientError> {
        request.check_window()?;
        self.health.check().await?;

        let started = Instant::now();
        let response = self
            .client
            .get(format!("{}/logs/query", self.health.base_url()))
            .query(&request.params())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.error.message)
                .unwrap_or(body);
            return Err(ClientError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let page: QueryResponse = response.json().await?;
        tracing::debug!(
            count = page.count,
            has_more = page.has_more,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Query completed"
        );
        Ok(page)
    }
}
