//! Client library embedded in instrumented applications
//!
//! ```ignore
//! let client = LogClient::new(ClientConfig::from_env()?);
//! tracing_subscriber::registry()
//!     .with(tracing_subscriber::fmt::layer())
//!     .with(client.layer())
//!     .init();
//! ```

pub mod config;
pub mod health;
pub mod layer;
pub mod query;
pub mod queue;
pub mod transport;

pub use self::config::{ClientConfig, ClientOverrides, ConfigError};
pub use health::{DaemonHealth, DaemonStatus};
pub use layer::TelemetryLayer;
pub use query::{QueryClient, QueryRequest, QueryResponse};
pub use queue::{EventQueue, QueueConfig};
pub use transport::{BatchSender, HttpTransport, TransportConfig};

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::model::{Level, LogRecord};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(
        "logdock daemon is not reachable at {url}.\n\n\
         Start the daemon with:\n  logdock serve\n\n\
         Or, if the daemon runs elsewhere:\n  export LOGDOCK_DAEMON_HOST=<host>\n  export LOGDOCK_DAEMON_PORT=<port>"
    )]
    DaemonUnavailable { url: String },

    #[error("Time window {hours}h exceeds 24 hours. Use --full-search to allow longer searches.")]
    WindowTooWide { hours: u64 },

    #[error("Daemon rejected the query ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

struct ClientInner {
    config: ClientConfig,
    queue: EventQueue,
}

/// Handle shared by call sites and the tracing layer
#[derive(Clone)]
pub struct LogClient {
    inner: Arc<ClientInner>,
}

impl LogClient {
    /// Ship records to the daemon over HTTP
    pub fn new(config: ClientConfig) -> Self {
        let transport = Arc::new(HttpTransport::new(
            config.application_id.clone(),
            config.transport.clone(),
        ));
        Self::with_sender(config, transport)
    }

    pub fn with_sender(config: ClientConfig, sender: Arc<dyn BatchSender>) -> Self {
        let queue = EventQueue::new(config.queue.clone(), sender);
        if config.enabled {
            queue.start();
        } else {
            tracing::debug!(application_id = %config.application_id, "Log shipping disabled");
        }

        Self {
            inner: Arc::new(ClientInner { config, queue }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn queue(&self) -> &EventQueue {
        &self.inner.queue
    }

    /// A record stamped with this client's application, service and environment
    pub fn record(&self, level: Level, module_name: &str, message: impl Into<String>) -> LogRecord {
        let config = &self.inner.config;
        let mut record = LogRecord::new(level, message, config.application_id.clone(), module_name);
        record.service_name = config.service_name.clone();
        if let Some(environment) = &config.environment {
            record
                .context
                .insert("environment".to_string(), serde_json::Value::String(environment.clone()));
        }
        record
    }

    /// Hand a record to the queue unless shipping is disabled or it falls
    /// below `min_level`
    pub fn emit(&self, record: LogRecord) {
        let config = &self.inner.config;
        if !config.enabled || record.level_rank() < config.min_level.rank() {
            return;
        }
        self.inner.queue.enqueue(record);
    }

    pub fn log(&self, level: Level, module_name: &str, message: impl Into<String>) {
        if self.accepts(level) {
            self.emit(self.record(level, module_name, message));
        }
    }

    pub fn accepts(&self, level: Level) -> bool {
        self.inner.config.enabled && level.rank() >= self.inner.config.min_level.rank()
    }

    pub fn layer(&self) -> TelemetryLayer {
        TelemetryLayer::new(self.clone())
    }

    /// Flush what is buffered, waiting at most `grace`. `false` means some
    /// records were not delivered.
    pub fn shutdown(&self, grace: Duration) -> bool {
        self.inner.queue.shutdown(grace)
    }
}
