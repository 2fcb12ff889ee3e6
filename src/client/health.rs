//! Daemon availability probe with a short-lived cache

use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use super::ClientError;

pub const PROBE_TIMEOUT: Duration = Duration::from_millis(500);
pub const CACHE_TTL: Duration = Duration::from_secs(2);

/// Body of `GET /status`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaemonStatus {
    pub status: String,
    pub service_name: String,
    pub version: String,
    pub host: String,
    pub port: u16,
    pub retention_days: u32,
}

pub struct DaemonHealth {
    base_url: String,
    client: reqwest::Client,
    ttl: Duration,
    cache: Mutex<Option<(Instant, Option<DaemonStatus>)>>,
}

impl DaemonHealth {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_timing(base_url, PROBE_TIMEOUT, CACHE_TTL)
    }

    pub fn with_timing(base_url: impl Into<String>, timeout: Duration, ttl: Duration) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            ttl,
            cache: Mutex::new(None),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Current status, or `DaemonUnavailable`. Both outcomes are cached.
    pub async fn check(&self) -> Result<DaemonStatus, ClientError> {
        if let Some(cached) = self.cached() {
            return cached.ok_or_else(|| self.unavailable());
        }

        let started = Instant::now();
        let status = self.probe().await;
        tracing::debug!(
            url = %self.base_url,
            available = status.is_some(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Daemon health probe"
        );

        *self.cache.lock().unwrap_or_else(PoisonError::into_inner) = Some((Instant::now(), status.clone()));
        status.ok_or_else(|| self.unavailable())
    }

    pub async fn is_available(&self) -> bool {
        self.check().await.is_ok()
    }

    fn cached(&self) -> Option<Option<DaemonStatus>> {
        let cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        match &*cache {
            Some((at, status)) if at.elapsed() < self.ttl => Some(status.clone()),
            _ => None,
        }
    }

    async fn probe(&self) -> Option<DaemonStatus> {
        let response = self
            .client
            .get(format!("{}/status", self.base_url))
            .send()
            .await
            .ok()?;
        if !response.status().is_success() {
            return None;
        }
        response.json::<DaemonStatus>().await.ok()
    }

    fn unavailable(&self) -> ClientError {
        ClientError::DaemonUnavailable {
            url: self.base_url.clone(),
        }
    }
}
