//! Tracing layer that ships events as log records

use std::fmt;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::{layer::Context, registry::LookupSpan, Layer};

use super::LogClient;
use crate::model::Level;

/// Targets whose events are never shipped; the transport's own warnings
/// would otherwise feed back into the queue
const IGNORED_TARGETS: &[&str] = &[
    "logdock::client::transport",
    "logdock::client::queue",
    "logdock::client::health",
    "hyper",
    "reqwest",
    "h2",
    "want",
    "rustls",
];

pub struct TelemetryLayer {
    client: LogClient,
}

impl TelemetryLayer {
    pub fn new(client: LogClient) -> Self {
        Self { client }
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    exception_type: Option<String>,
    stacktrace: Option<String>,
    fields: serde_json::Map<String, serde_json::Value>,
}

impl FieldVisitor {
    fn record_value(&mut self, field: &Field, value: serde_json::Value) {
        self.fields.insert(field.name().to_string(), value);
    }

    fn record_text(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = Some(value),
            "exception_type" => self.exception_type = Some(value),
            "stacktrace" => self.stacktrace = Some(value),
            name => {
                self.fields.insert(name.to_string(), serde_json::Value::String(value));
            }
        }
    }
}

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.record_text(field, format!("{:?}", value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.record_text(field, value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.record_value(field, value.into());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.record_value(field, value.into());
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.record_value(field, value.into());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.record_value(field, value.into());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.record_text(field, value.to_string());
    }
}

impl<S> Layer<S> for TelemetryLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let target = metadata.target();
        if IGNORED_TARGETS.iter().any(|prefix| target.starts_with(prefix)) {
            return;
        }

        let level = Level::from_tracing(metadata.level());
        if !self.client.accepts(level) {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let module = metadata.module_path().unwrap_or(target);
        let mut record = self
            .client
            .record(level, module, visitor.message.unwrap_or_default());
        record.file_path = metadata.file().map(str::to_string);
        record.line_no = metadata.line().map(i64::from);
        record.exception_type = visitor.exception_type;
        record.stacktrace = visitor.stacktrace;
        record.context.extend(visitor.fields);

        self.client.emit(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{BatchSender, ClientConfig};
    use crate::model::LogRecord;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tracing_subscriber::layer::SubscriberExt;

    #[derive(Default)]
    struct CollectingSender {
        records: Mutex<Vec<LogRecord>>,
    }

    #[async_trait]
    impl BatchSender for CollectingSender {
        async fn send(&self, batch: Vec<LogRecord>) {
            self.records.lock().unwrap().extend(batch);
        }
    }

    fn capture(min_level: Level, emit: impl FnOnce()) -> Vec<LogRecord> {
        let sender = Arc::new(CollectingSender::default());
        let client = LogClient::with_sender(
            ClientConfig {
                application_id: "layer-test".to_string(),
                min_level,
                ..Default::default()
            },
            sender.clone(),
        );

        let subscriber = tracing_subscriber::registry().with(client.layer());
        tracing::subscriber::with_default(subscriber, emit);

        assert!(client.shutdown(Duration::from_secs(5)));
        let records = sender.records.lock().unwrap().clone();
        records
    }

    #[test]
    fn test_event_becomes_record() {
        let records = capture(Level::Debug, || {
            tracing::info!(user_id = 42, cached = true, "user logged in");
        });

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.level, "INFO");
        assert_eq!(record.message, "user logged in");
        assert_eq!(record.application_id, "layer-test");
        assert_eq!(record.module_name, module_path!());
        assert!(record.file_path.as_deref().unwrap().ends_with("layer.rs"));
        assert!(record.line_no.is_some());
        assert_eq!(record.context.get("user_id"), Some(&json!(42)));
        assert_eq!(record.context.get("cached"), Some(&json!(true)));
    }

    #[test]
    fn test_exception_fields_extracted() {
        let records = capture(Level::Debug, || {
            tracing::error!(
                exception_type = "ConnectionReset",
                stacktrace = "at fetch()\nat main()",
                "upstream failed"
            );
        });

        assert_eq!(records[0].level, "ERROR");
        assert_eq!(records[0].exception_type.as_deref(), Some("ConnectionReset"));
        assert_eq!(records[0].stacktrace.as_deref(), Some("at fetch()\nat main()"));
        assert!(records[0].context.is_empty());
    }

    #[test]
    fn test_min_level_and_ignored_targets() {
        let records = capture(Level::Warn, || {
            tracing::info!("below threshold");
            tracing::warn!(target: "reqwest::connect", "transport noise");
            tracing::warn!(target: "logdock::client::transport", "own warning");
            tracing::warn!("kept");
        });

        let messages: Vec<&str> = records.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(messages, vec!["kept"]);
    }
}
