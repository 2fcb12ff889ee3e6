use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Daemon configuration
///
/// Layered as defaults, then an optional `logdock.toml`, then
/// `LOGDOCK__SECTION__KEY` environment variables, then the flat
/// `LOGDOCK_DAEMON_HOST` / `LOGDOCK_DAEMON_PORT` / `LOGDOCK_DATABASE_URL` /
/// `LOGDOCK_RETENTION_DAYS` variables.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DaemonConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub retention: RetentionSettings,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: String,
    /// Service name reported by `/status`
    pub service_name: String,
    /// Maximum accepted ingest body, in bytes
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    pub database_url: String,
    /// Rows removed per retention DELETE statement
    pub delete_chunk: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetentionSettings {
    pub days: RetentionConfig,
    /// Seconds between scheduled retention passes
    pub interval_secs: u64,
}

impl RetentionSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetricsConfig {
    pub enabled: bool,
}

pub const DEFAULT_RETENTION_DAYS: u32 = 7;
pub const MIN_RETENTION_DAYS: u32 = 1;
pub const MAX_RETENTION_DAYS: u32 = 365;

/// Retention period in days, always within 1..=365
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawDays", into = "u32")]
pub struct RetentionConfig {
    days: u32,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDays {
    Number(i64),
    Text(String),
}

impl From<RawDays> for RetentionConfig {
    fn from(raw: RawDays) -> Self {
        match raw {
            RawDays::Number(days) => Self::from_days(days),
            RawDays::Text(text) => Self::parse(&text),
        }
    }
}

impl From<RetentionConfig> for u32 {
    fn from(config: RetentionConfig) -> Self {
        config.days
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            days: DEFAULT_RETENTION_DAYS,
        }
    }
}

impl RetentionConfig {
    /// Clamp into the accepted range
    pub fn from_days(days: i64) -> Self {
        let clamped = days.clamp(MIN_RETENTION_DAYS as i64, MAX_RETENTION_DAYS as i64);
        Self { days: clamped as u32 }
    }

    /// Parse a user-supplied value; anything that is not an integer yields the default.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<i64>() {
            Ok(days) => Self::from_days(days),
            Err(_) => {
                tracing::warn!(value = %raw, default = DEFAULT_RETENTION_DAYS, "Invalid retention days, using default");
                Self::default()
            }
        }
    }

    /// `LOGDOCK_RETENTION_DAYS`, or the default when unset
    pub fn from_env() -> Self {
        std::env::var("LOGDOCK_RETENTION_DAYS")
            .map(|raw| Self::parse(&raw))
            .unwrap_or_default()
    }

    pub fn days(&self) -> u32 {
        self.days
    }
}

pub fn load_config(path: Option<&str>) -> anyhow::Result<DaemonConfig> {
    let env = |key: &str| std::env::var(key).ok();

    let config = config::Config::builder()
        .set_default("server.host", "127.0.0.1")?
        .set_default("server.port", 8001)?
        .set_default("server.log_level", "info")?
        .set_default("server.log_format", "text")?
        .set_default("server.service_name", "logdock")?
        .set_default("server.max_body_bytes", 10 * 1024 * 1024)?
        .set_default("storage.database_url", "sqlite:./data/logdock.db")?
        .set_default("storage.delete_chunk", 5_000)?
        .set_default("retention.days", DEFAULT_RETENTION_DAYS as i64)?
        .set_default("retention.interval_secs", 3_600)?
        .set_default("metrics.enabled", true)?
        .add_source(config::File::with_name(path.unwrap_or("logdock")).required(path.is_some()))
        .add_source(
            config::Environment::with_prefix("LOGDOCK")
                .prefix_separator("__")
                .separator("__"),
        )
        .set_override_option("server.host", env("LOGDOCK_DAEMON_HOST"))?
        .set_override_option("server.port", env("LOGDOCK_DAEMON_PORT"))?
        .set_override_option("storage.database_url", env("LOGDOCK_DATABASE_URL"))?
        .set_override_option("retention.days", env("LOGDOCK_RETENTION_DAYS"))?
        .build()?;

    let cfg: DaemonConfig = config.try_deserialize()?;
    validate_config(&cfg)?;

    Ok(cfg)
}

fn validate_config(cfg: &DaemonConfig) -> anyhow::Result<()> {
    if cfg.server.host.trim().is_empty() {
        anyhow::bail!("server.host cannot be empty");
    }

    match cfg.server.log_format.as_str() {
        "text" | "json" => {}
        other => anyhow::bail!("server.log_format must be 'text' or 'json', got '{}'", other),
    }

    if !cfg.storage.database_url.starts_with("sqlite:") {
        anyhow::bail!(
            "storage.database_url must be a sqlite URL (e.g. sqlite:./data/logdock.db), got '{}'",
            cfg.storage.database_url
        );
    }

    if cfg.storage.delete_chunk <= 0 {
        anyhow::bail!("storage.delete_chunk must be positive");
    }

    if cfg.retention.interval_secs == 0 {
        anyhow::bail!("retention.interval_secs must be positive");
    }

    Ok(())
}
