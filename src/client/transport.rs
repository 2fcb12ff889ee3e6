//! HTTP delivery of record batches to the daemon
//!
//! Failures never propagate: each attempt that fails is logged at warning
//! level, and a batch that exhausts its attempts is dropped.

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::sync::Arc;
use std::time::Duration;

use crate::model::{LogBatch, LogRecord};

/// Destination for batches drained by the queue worker
#[async_trait]
pub trait BatchSender: Send + Sync {
    async fn send(&self, batch: Vec<LogRecord>);
}

#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Full ingest URL, e.g. `http://localhost:8001/logs/ingest`
    pub endpoint: String,
    pub max_retries: u32,
    pub base_backoff: Duration,
    pub http_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8001/logs/ingest".to_string(),
            max_retries: 3,
            base_backoff: Duration::from_millis(100),
            http_timeout: Duration::from_secs(1),
        }
    }
}

pub struct HttpTransport {
    application_id: String,
    config: TransportConfig,
    /// HTTP client tagged with the pid that built it
    client: ArcSwapOption<(u32, reqwest::Client)>,
}

impl HttpTransport {
    pub fn new(application_id: impl Into<String>, config: TransportConfig) -> Self {
        Self {
            application_id: application_id.into(),
            config,
            client: ArcSwapOption::empty(),
        }
    }

    /// A client owned by the current process. A forked child never reuses
    /// the parent's connection state.
    fn client(&self) -> Option<reqwest::Client> {
        let pid = std::process::id();
        if let Some(cached) = self.client.load_full() {
            if cached.0 == pid {
                return Some(cached.1.clone());
            }
        }

        match reqwest::Client::builder()
            .timeout(self.config.http_timeout)
            .pool_max_idle_per_host(0)
            .build()
        {
            Ok(client) => {
                self.client.store(Some(Arc::new((pid, client.clone()))));
                Some(client)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to build HTTP client for log transport");
                None
            }
        }
    }

    fn give_up(&self, reason: &'static str, records: usize) {
        crate::metrics::record_transport_failure(reason, records);
    }
}

#[async_trait]
impl BatchSender for HttpTransport {
    async fn send(&self, batch: Vec<LogRecord>) {
        if batch.is_empty() {
            return;
        }

        let records = batch.len();
        let payload = LogBatch {
            application_id: self.application_id.clone(),
            logs: batch,
        };
        let body = match serde_json::to_vec(&payload) {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(error = %e, records = records, "Failed to serialize log batch, dropping it");
                return;
            }
        };

        let Some(client) = self.client() else {
            self.give_up("client_unavailable", records);
            return;
        };

        let max_retries = self.config.max_retries.max(1);
        for attempt in 1..=max_retries {
            let result = client
                .post(&self.config.endpoint)
                .header(CONTENT_TYPE, "application/json")
                .body(body.clone())
                .send()
                .await
                .and_then(|response| response.error_for_status());

            match result {
                Ok(_) => return,
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt,
                        max_retries = max_retries,
                        endpoint = %self.config.endpoint,
                        error = %e,
                        "Log transport failed to reach daemon"
                    );
                    if attempt < max_retries {
                        tokio::time::sleep(self.config.base_backoff * attempt).await;
                    }
                }
            }
        }

        tracing::warn!(records = records, "Dropping log batch after exhausting retries");
        self.give_up("exhausted", records);
    }
}
