/// Client library -> HTTP daemon -> SQLite -> query client, over a real socket
use logdock::{
    client::{ClientConfig, ClientError, LogClient, QueryClient, QueryRequest, QueueConfig, TransportConfig},
    config::{DaemonConfig, MetricsConfig, RetentionConfig, RetentionSettings, ServerConfig, StorageConfig},
    handlers::AppState,
    model::Level,
    server::create_router,
    storage::{LogStore, SqliteLogStore},
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::layer::SubscriberExt;

async fn start_daemon() -> (SocketAddr, Arc<SqliteLogStore>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}", dir.path().join("logs.db").display());
    let store = Arc::new(SqliteLogStore::new(&url).await.unwrap());

    let config = DaemonConfig {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            log_level: "info".to_string(),
            log_format: "text".to_string(),
            service_name: "logdock".to_string(),
            max_body_bytes: 10 * 1024 * 1024,
        },
        storage: StorageConfig {
            database_url: url,
            delete_chunk: 5000,
        },
        retention: RetentionSettings {
            days: RetentionConfig::default(),
            interval_secs: 3600,
        },
        metrics: MetricsConfig { enabled: false },
    };

    let app = create_router(AppState::new(store.clone(), config), None);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, store, dir)
}

fn client_config(addr: SocketAddr) -> ClientConfig {
    ClientConfig {
        application_id: "e2e".to_string(),
        service_name: Some("checkout".to_string()),
        environment: Some("test".to_string()),
        queue: QueueConfig {
            flush_interval: Duration::from_millis(50),
            ..Default::default()
        },
        transport: TransportConfig {
            endpoint: format!("http://{}/logs/ingest", addr),
            ..Default::default()
        },
        ..Default::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_records_flow_from_client_to_query() {
    let (addr, store, _dir) = start_daemon().await;
    let client = LogClient::new(client_config(addr));

    client.log(Level::Info, "checkout.cart", "cart loaded");
    client.log(Level::Error, "checkout.payment", "card declined");

    let subscriber = tracing_subscriber::registry().with(client.layer());
    tracing::subscriber::with_default(subscriber, || {
        tracing::warn!(order_id = 991, "inventory low");
    });

    let flushing = client.clone();
    let flushed = tokio::task::spawn_blocking(move || flushing.shutdown(Duration::from_secs(10)))
        .await
        .unwrap();
    assert!(flushed);
    assert_eq!(store.count().await.unwrap(), 3);

    let query = QueryClient::new(format!("http://{}", addr)).unwrap();
    let page = query
        .query(&QueryRequest {
            application_id: Some("e2e".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(page.count, 3);
    assert!(!page.has_more);
    assert!(page.results.iter().all(|r| r.service_name.as_deref() == Some("checkout")));
    assert!(page.results.iter().all(|r| r.environment() == Some("test")));

    let traced = page
        .results
        .iter()
        .find(|r| r.message == "inventory low")
        .unwrap();
    assert_eq!(traced.level, "WARN");
    assert_eq!(traced.context.get("order_id"), Some(&serde_json::json!(991)));

    let errors = query
        .query(&QueryRequest {
            min_level: Some(Level::Error),
            pattern: Some("declined".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(errors.count, 1);
    assert_eq!(errors.results[0].module_name, "checkout.payment");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_query_client_distinguishes_failures() {
    let (addr, _store, _dir) = start_daemon().await;
    let query = QueryClient::new(format!("http://{}", addr)).unwrap();

    let too_wide = query
        .query(&QueryRequest {
            hours: 72,
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(too_wide, ClientError::WindowTooWide { hours: 72 }));

    let allowed = query
        .query(&QueryRequest {
            hours: 72,
            full_search: true,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(allowed.count, 0);

    let offline = QueryClient::new("http://127.0.0.1:1").unwrap();
    let err = offline.query(&QueryRequest::default()).await.unwrap_err();
    assert!(matches!(err, ClientError::DaemonUnavailable { .. }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unreachable_daemon_never_blocks_caller() {
    let mut config = client_config("127.0.0.1:1".parse().unwrap());
    config.transport.max_retries = 2;
    config.transport.base_backoff = Duration::from_millis(1);
    let client = LogClient::new(config);

    let started = std::time::Instant::now();
    for i in 0..500 {
        client.log(Level::Info, "loop", format!("event {}", i));
    }
    assert!(started.elapsed() < Duration::from_secs(1));

    let flushing = client.clone();
    tokio::task::spawn_blocking(move || flushing.shutdown(Duration::from_secs(10)))
        .await
        .unwrap();
}
