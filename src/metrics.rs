use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Install the Prometheus recorder for the daemon
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))?;

    init_metric_descriptions();

    Ok(handle)
}

/// Initialize metric descriptions (can be called multiple times safely)
fn init_metric_descriptions() {
    describe_counter!(
        "logdock_queue_dropped_total",
        "Records dropped by the client queue on overflow"
    );
    describe_counter!(
        "logdock_transport_failures_total",
        "Batches dropped by the client transport"
    );
    describe_counter!(
        "logdock_ingested_records_total",
        "Records accepted by the ingest endpoint"
    );
    describe_counter!(
        "logdock_ingest_rejected_total",
        "Ingest requests rejected as invalid"
    );
    describe_counter!(
        "logdock_retention_deleted_total",
        "Records removed by retention"
    );
    describe_histogram!(
        "logdock_query_duration_seconds",
        "Query execution time in seconds"
    );
    describe_gauge!("logdock_info", "Daemon version information");

    gauge!("logdock_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
}

pub fn record_queue_dropped(count: u64) {
    counter!("logdock_queue_dropped_total").increment(count);
}

/// `reason` is `exhausted` or `client_unavailable`
pub fn record_transport_failure(reason: &'static str, records: usize) {
    counter!("logdock_transport_failures_total", "reason" => reason).increment(1);
    counter!("logdock_transport_dropped_records_total", "reason" => reason).increment(records as u64);
}

pub fn record_ingested(application_id: &str, count: u64) {
    counter!(
        "logdock_ingested_records_total",
        "application_id" => application_id.to_string(),
    )
    .increment(count);
}

pub fn record_ingest_rejected() {
    counter!("logdock_ingest_rejected_total").increment(1);
}

pub fn record_retention_deleted(count: u64) {
    counter!("logdock_retention_deleted_total").increment(count);
}

pub fn record_query_duration(duration: Duration) {
    histogram!("logdock_query_duration_seconds").record(duration.as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_metrics() {
        init_metric_descriptions();

        record_queue_dropped(3);
        record_transport_failure("exhausted", 50);
        record_ingested("app", 10);
        record_ingest_rejected();
        record_retention_deleted(7);
        record_query_duration(Duration::from_millis(12));

        // Without an installed recorder these are no-ops; they must not panic
    }
}
