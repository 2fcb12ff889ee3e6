//! Client-side settings
//!
//! Resolution order, highest first: explicit overrides, `LOGDOCK_*`
//! environment variables, `_logdock/config.json` under the project root,
//! then built-in defaults. The application id falls back to `my-app` so an
//! unconfigured application still starts.

use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use super::queue::QueueConfig;
use super::transport::TransportConfig;
use crate::model::Level;

pub const DEFAULT_APPLICATION_ID: &str = "my-app";
pub const DEFAULT_DAEMON_URL: &str = "http://localhost:8001/logs/ingest";
pub const CONFIG_FILE: &str = "_logdock/config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid daemon URL '{0}'. Expected an http(s) URL like http://localhost:8001/logs/ingest")]
    InvalidDaemonUrl(String),

    #[error("Invalid value '{value}' for {key}")]
    InvalidValue { key: &'static str, value: String },

    #[error("Failed to load client configuration: {0}")]
    Source(#[from] config::ConfigError),
}

/// Values supplied directly by the embedding application
#[derive(Debug, Clone, Default)]
pub struct ClientOverrides {
    pub application_id: Option<String>,
    pub daemon_url: Option<String>,
    pub service_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub application_id: String,
    pub service_name: Option<String>,
    /// Stamped into every record's `context.environment`
    pub environment: Option<String>,
    pub enabled: bool,
    /// Events below this level are not shipped
    pub min_level: Level,
    pub queue: QueueConfig,
    /// `transport.endpoint` is the daemon's ingest URL
    pub transport: TransportConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            application_id: DEFAULT_APPLICATION_ID.to_string(),
            service_name: None,
            environment: None,
            enabled: true,
            min_level: Level::Debug,
            queue: QueueConfig::default(),
            transport: TransportConfig::default(),
        }
    }
}

/// Everything the layered sources may supply, as raw strings
#[derive(Debug, Default, Deserialize)]
struct RawClientSettings {
    application_id: Option<String>,
    // camelCase spelling in the JSON file, possibly case-folded by the loader
    #[serde(rename = "applicationid", alias = "applicationId")]
    application_id_camel: Option<String>,
    daemon_url: Option<String>,
    daemon_host: Option<String>,
    daemon_port: Option<String>,
    service_name: Option<String>,
    environment: Option<String>,
    enabled: Option<String>,
    min_level: Option<String>,
    queue_max_size: Option<String>,
    batch_size: Option<String>,
    flush_interval_ms: Option<String>,
    max_retries: Option<String>,
    backoff_ms: Option<String>,
    http_timeout_ms: Option<String>,
}

impl ClientConfig {
    /// Load from the process environment and the current directory
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(Path::new("."), ClientOverrides::default(), None)
    }

    /// Load with explicit overrides. `env` replaces the process environment
    /// when given.
    pub fn load(
        project_root: &Path,
        overrides: ClientOverrides,
        env: Option<config::Map<String, String>>,
    ) -> Result<Self, ConfigError> {
        let file = project_root.join(CONFIG_FILE);

        let settings = config::Config::builder()
            .add_source(
                config::File::from(file)
                    .format(config::FileFormat::Json)
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix("LOGDOCK")
                    .prefix_separator("_")
                    .source(env),
            )
            .set_override_option("application_id", overrides.application_id)?
            .set_override_option("daemon_url", overrides.daemon_url)?
            .set_override_option("service_name", overrides.service_name)?
            .build()?;

        let raw: RawClientSettings = settings.try_deserialize()?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawClientSettings) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let application_id = raw
            .application_id
            .or(raw.application_id_camel)
            .filter(|id| !id.trim().is_empty())
            .unwrap_or(defaults.application_id);

        let daemon_url = match (raw.daemon_url, raw.daemon_host, raw.daemon_port) {
            (Some(url), _, _) => url,
            (None, None, None) => DEFAULT_DAEMON_URL.to_string(),
            (None, host, port) => format!(
                "http://{}:{}/logs/ingest",
                host.as_deref().unwrap_or("localhost"),
                port.as_deref().unwrap_or("8001")
            ),
        };
        validate_daemon_url(&daemon_url)?;

        let min_level = match raw.min_level {
            Some(level) => Level::parse(&level).ok_or(ConfigError::InvalidValue {
                key: "min_level",
                value: level,
            })?,
            None => defaults.min_level,
        };

        let queue = QueueConfig {
            max_size: parse_or("queue_max_size", raw.queue_max_size, defaults.queue.max_size)?,
            batch_size: parse_or("batch_size", raw.batch_size, defaults.queue.batch_size)?,
            flush_interval: parse_millis_or(
                "flush_interval_ms",
                raw.flush_interval_ms,
                defaults.queue.flush_interval,
            )?,
        };

        let transport = TransportConfig {
            endpoint: daemon_url,
            max_retries: parse_or("max_retries", raw.max_retries, defaults.transport.max_retries)?,
            base_backoff: parse_millis_or("backoff_ms", raw.backoff_ms, defaults.transport.base_backoff)?,
            http_timeout: parse_millis_or(
                "http_timeout_ms",
                raw.http_timeout_ms,
                defaults.transport.http_timeout,
            )?,
        };

        Ok(Self {
            application_id,
            service_name: raw.service_name.filter(|s| !s.is_empty()),
            environment: raw.environment.filter(|s| !s.is_empty()),
            enabled: raw.enabled.as_deref().map_or(true, parse_enabled),
            min_level,
            queue,
            transport,
        })
    }

    /// Scheme, host and port of the daemon, without the ingest path
    pub fn daemon_base_url(&self) -> String {
        match reqwest::Url::parse(&self.transport.endpoint) {
            Ok(url) => url.origin().ascii_serialization(),
            Err(_) => self.transport.endpoint.clone(),
        }
    }
}

/// Truthy and falsey spellings; anything unrecognized disables shipping.
pub fn parse_enabled(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn validate_daemon_url(url: &str) -> Result<(), ConfigError> {
    match reqwest::Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") && parsed.host().is_some() => Ok(()),
        _ => Err(ConfigError::InvalidDaemonUrl(url.to_string())),
    }
}

fn parse_or<T: FromStr>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value }),
        None => Ok(default),
    }
}

fn parse_millis_or(key: &'static str, raw: Option<String>, default: Duration) -> Result<Duration, ConfigError> {
    let default_ms = default.as_millis() as u64;
    parse_or(key, raw, default_ms).map(Duration::from_millis)
}
