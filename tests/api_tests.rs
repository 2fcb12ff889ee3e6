/// Integration tests for the daemon HTTP API
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use logdock::{
    config::{DaemonConfig, MetricsConfig, RetentionConfig, RetentionSettings, ServerConfig, StorageConfig},
    handlers::AppState,
    model::current_ts,
    server::create_router,
    storage::{LogStore, SqliteLogStore},
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn create_test_config() -> DaemonConfig {
    DaemonConfig {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8001,
            log_level: "info".to_string(),
            log_format: "text".to_string(),
            service_name: "logdock".to_string(),
            max_body_bytes: 1024 * 1024,
        },
        storage: StorageConfig {
            database_url: "sqlite::memory:".to_string(),
            delete_chunk: 5000,
        },
        retention: RetentionSettings {
            days: RetentionConfig::default(),
            interval_secs: 3600,
        },
        metrics: MetricsConfig { enabled: false },
    }
}

async fn create_test_app() -> (Router, Arc<SqliteLogStore>) {
    let store = Arc::new(SqliteLogStore::new("sqlite::memory:").await.unwrap());
    let state = AppState::new(store.clone(), create_test_config());
    (create_router(state, None), store)
}

fn record(ts: f64, level: &str, message: &str) -> Value {
    json!({
        "ts": ts,
        "level": level,
        "message": message,
        "application_id": "app",
        "module_name": "worker",
    })
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn ingest(app: &Router, logs: Vec<Value>) -> (StatusCode, Value) {
    let body = json!({"application_id": "app", "logs": logs});
    send(
        app,
        Request::post("/logs/ingest")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}

async fn query(app: &Router, params: &str) -> (StatusCode, Value) {
    send(app, Request::get(format!("/logs/query?{}", params)).body(Body::empty()).unwrap()).await
}

#[tokio::test]
async fn test_ingest_single_record() {
    let (app, store) = create_test_app().await;

    let (status, body) = ingest(&app, vec![record(current_ts(), "INFO", "hello")]).await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body, json!({"accepted": 1}));
    assert_eq!(store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_invalid_record_rejects_whole_batch() {
    let (app, store) = create_test_app().await;
    let now = current_ts();

    let mut missing_level = record(now, "INFO", "second");
    missing_level.as_object_mut().unwrap().remove("level");

    let (status, body) = ingest(&app, vec![record(now, "INFO", "first"), missing_level]).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "validation_error");
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_malformed_json_rejected() {
    let (app, store) = create_test_app().await;

    let (status, body) = send(
        &app,
        Request::post("/logs/ingest")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "validation_error");
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_query_pages_through_results() {
    let (app, _store) = create_test_app().await;
    let now = current_ts();
    let logs = (0..10)
        .map(|i| record(now - 100.0 + i as f64, "INFO", &format!("message {}", i)))
        .collect();
    ingest(&app, logs).await;

    let mut sizes = Vec::new();
    let mut seen = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let mut params = "since=10m&limit=4".to_string();
        if let Some(c) = &cursor {
            params.push_str(&format!("&cursor={}", c.replace('=', "%3D")));
        }
        let (status, body) = query(&app, &params).await;
        assert_eq!(status, StatusCode::OK);

        let results = body["results"].as_array().unwrap();
        assert_eq!(body["count"], results.len());
        sizes.push(results.len());
        seen.extend(results.iter().map(|r| r["message"].as_str().unwrap().to_string()));

        if body["has_more"] == json!(true) {
            cursor = Some(body["next_cursor"].as_str().unwrap().to_string());
        } else {
            assert!(body["next_cursor"].is_null());
            break;
        }
    }

    assert_eq!(sizes, vec![4, 4, 2]);
    let expected: Vec<String> = (0..10).rev().map(|i| format!("message {}", i)).collect();
    assert_eq!(seen, expected);
}

#[tokio::test]
async fn test_query_min_level_and_filters() {
    let (app, _store) = create_test_app().await;
    let now = current_ts();
    ingest(
        &app,
        vec![
            record(now - 4.0, "DEBUG", "noise"),
            record(now - 3.0, "ERROR", "db timeout"),
            record(now - 2.0, "WARN", "slow query"),
            record(now - 1.0, "CRITICAL", "db down"),
        ],
    )
    .await;

    let (status, body) = query(&app, "since=5m&min_level=error").await;
    assert_eq!(status, StatusCode::OK);
    let levels: Vec<&str> = body["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["level"].as_str().unwrap())
        .collect();
    assert_eq!(levels, vec!["CRITICAL", "ERROR"]);

    let (_, body) = query(&app, "since=5m&message_contains=DB&min_level=ERROR&module_name=worker,other").await;
    assert_eq!(body["count"], 2);

    let (_, body) = query(&app, "since=5m&message_regex=%5Eslow").await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["results"][0]["message"], "slow query");
}

#[tokio::test]
async fn test_query_rejections() {
    let (app, _store) = create_test_app().await;

    let (status, body) = query(&app, "min_level=LOUD").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "invalid_level");

    let (status, body) = query(&app, "since=48h").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "window_too_wide");

    let (status, _) = query(&app, "since=48h&full_search=true").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = query(&app, "message_regex=(unclosed").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "invalid_pattern");

    let (status, body) = query(&app, "limit=5000").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "invalid_limit");

    let (status, body) = query(&app, "since=99999999d&full_search=true").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "invalid_time");

    let (status, body) = query(&app, "after_cursor=garbage").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "invalid_cursor");
}

#[tokio::test]
async fn test_clear_scoped_to_environment() {
    let (app, store) = create_test_app().await;
    let now = current_ts();

    let mut staging = record(now, "INFO", "staging record");
    staging["context"] = json!({"environment": "staging"});
    let mut production = record(now, "INFO", "production record");
    production["context"] = json!({"environment": "production"});
    ingest(&app, vec![staging, production]).await;

    let (status, body) = send(
        &app,
        Request::post("/logs/clear?application_id=app&environment=staging")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"deleted": 1}));

    let (_, body) = query(&app, "since=5m").await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["results"][0]["message"], "production record");
    assert_eq!(store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_clear_requires_application_id() {
    let (app, _store) = create_test_app().await;

    let (status, body) = send(&app, Request::post("/logs/clear").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "validation_error");
}

#[tokio::test]
async fn test_status_reports_configuration() {
    let (app, _store) = create_test_app().await;

    let (status, body) = send(&app, Request::get("/status").body(Body::empty()).unwrap()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service_name"], "logdock");
    assert_eq!(body["port"], 8001);
    assert_eq!(body["retention_days"], 7);
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_metrics_route_requires_recorder() {
    let (app, _store) = create_test_app().await;

    let response = app
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
