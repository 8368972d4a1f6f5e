mod common;

use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use common::{reading, spawn_server, FakeSource};
use sensor_dashboard::{
    dashboard, FeedOptions, FeedStatus, HttpReadingSource, ReadingSource, SensorFeed, SourceError,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(5);

fn items_body() -> serde_json::Value {
    json!({
        "items": [
            {
                "id": "b", "timestamp": "2024-01-01T00:01:00Z", "ttl": 1704067260,
                "name": "Sensor Sala", "location": "Living room", "device_type": "ESP32",
                "status": "active", "temperature": 21.0, "humidity": 48.0,
                "pm1_0": 3.0, "pm2_5": 7.0, "pm10": 12.0
            },
            {
                "id": "a", "timestamp": "2024-01-01T00:00:00Z", "ttl": 1704067200,
                "name": "Sensor Sala", "location": "Living room", "device_type": "ESP32",
                "status": "active", "temperature": 20.0, "humidity": 50.0,
                "pm1_0": 0, "pm2_5": 0, "pm10": 0
            }
        ],
        "count": 2
    })
}

#[tokio::test]
async fn test_http_source_reads_items() -> anyhow::Result<()> {
    // Arrange - the api insists on a json accept header
    let app = Router::new().route(
        "/dev/items",
        get(|headers: HeaderMap| async move {
            match headers.get(header::ACCEPT).and_then(|v| v.to_str().ok()) {
                Some("application/json") => Json(items_body()).into_response(),
                _ => StatusCode::NOT_ACCEPTABLE.into_response(),
            }
        }),
    );
    let base = spawn_server(app).await?;
    let source = HttpReadingSource::new(&format!("{base}/dev"), TIMEOUT);

    // Act
    let readings = source.fetch_readings().await?;

    // Assert
    assert_eq!(readings.len(), 2);
    assert_eq!(readings[0].id, "b");
    assert_eq!(readings[1].pm2_5, 0.0);
    Ok(())
}

#[tokio::test]
async fn test_http_source_fetches_single_reading() -> anyhow::Result<()> {
    let app = Router::new().route("/items", get(|| async { Json(items_body()) }));
    let source = HttpReadingSource::new(&spawn_server(app).await?, TIMEOUT);

    let a = source.fetch_reading("a").await?;
    let missing = source.fetch_reading("zzz").await?;

    assert_eq!(a.map(|r| r.temperature), Some(20.0));
    assert!(missing.is_none());
    Ok(())
}

#[tokio::test]
async fn test_http_source_surfaces_status_errors() -> anyhow::Result<()> {
    let app = Router::new().route(
        "/items",
        get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "maintenance") }),
    );
    let source = HttpReadingSource::new(&spawn_server(app).await?, TIMEOUT);

    let err = source.fetch_readings().await.unwrap_err();

    assert_eq!(err.status(), Some(503));
    assert_eq!(err.to_string(), "HTTP error: 503 - Service Unavailable");
    Ok(())
}

#[tokio::test]
async fn test_http_source_rejects_missing_items() -> anyhow::Result<()> {
    let app = Router::new().route("/items", get(|| async { Json(json!({ "count": 0 })) }));
    let source = HttpReadingSource::new(&spawn_server(app).await?, TIMEOUT);

    let err = source.fetch_readings().await.unwrap_err();

    assert!(matches!(err, SourceError::Format { .. }));
    Ok(())
}

#[tokio::test]
async fn test_http_source_times_out_slow_api() -> anyhow::Result<()> {
    let app = Router::new().route(
        "/items",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Json(items_body())
        }),
    );
    let source = HttpReadingSource::new(&spawn_server(app).await?, Duration::from_millis(100));

    let err = source.fetch_readings().await.unwrap_err();

    assert!(matches!(err, SourceError::Timeout { timeout_ms: 100 }));
    Ok(())
}

#[tokio::test]
async fn test_http_source_reports_unreachable_api() -> anyhow::Result<()> {
    // bind then release a port so nothing listens on it
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    let source = HttpReadingSource::new(&format!("http://{addr}"), TIMEOUT);

    let err = source.fetch_readings().await.unwrap_err();

    assert!(matches!(err, SourceError::Transport { .. }));
    Ok(())
}

#[tokio::test]
async fn test_feed_over_http_merges_successive_polls() -> anyhow::Result<()> {
    // Arrange - every call publishes one more reading
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new().route(
        "/items",
        get({
            let hits = hits.clone();
            move || {
                let n = hits.fetch_add(1, Ordering::SeqCst) as i64;
                async move {
                    let items: Vec<_> = (0..=n).map(|i| reading(&format!("r{i}"), i * 60, 20.0 + i as f64)).collect();
                    Json(json!({ "count": items.len(), "items": items }))
                }
            }
        }),
    );
    let source = HttpReadingSource::new(&spawn_server(app).await?, TIMEOUT);
    let feed = SensorFeed::new(
        Arc::new(source),
        FeedOptions {
            poll_interval: Duration::from_secs(3600),
            max_data_points: 3,
        },
    );

    // Act
    for _ in 0..5 {
        feed.refetch().await;
    }

    // Assert
    let snapshot = feed.snapshot().await;
    assert_eq!(snapshot.status, FeedStatus::Live);
    let ids: Vec<_> = snapshot.readings.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, ["r2", "r3", "r4"]);
    assert_eq!(snapshot.previous.map(|r| r.id), Some("r3".to_string()));
    Ok(())
}

#[tokio::test]
async fn test_dashboard_serves_snapshot_and_actions() -> anyhow::Result<()> {
    // Arrange
    let source = Arc::new(
        FakeSource::new()
            .then_ok(vec![reading("a", 0, 20.0)])
            .then_err(common::http_503())
            .then_ok(vec![reading("b", 60, 21.0)]),
    );
    let feed = SensorFeed::new(source, FeedOptions::default());
    feed.refetch().await;
    feed.refetch().await;
    let base = spawn_server(dashboard::router(feed.clone())).await?;
    let client = reqwest::Client::new();

    // Act & Assert - degraded api view
    let api: serde_json::Value = client.get(format!("{base}/api")).send().await?.json().await?;
    assert_eq!(api["status"], "degraded");
    assert_eq!(api["latest"]["id"], "a");
    assert!(api["last_error"].as_str().unwrap().contains("503"));

    // html shows the error banner and the card
    let html = client.get(format!("{base}/")).send().await?.text().await?;
    assert!(html.contains("Disconnected"));
    assert!(html.contains("Connection error"));
    assert!(html.contains("Sensor Inactive"));

    // dismiss keeps the connection state
    let api: serde_json::Value = client
        .post(format!("{base}/api/clear-error"))
        .send()
        .await?
        .json()
        .await?;
    assert!(api["last_error"].is_null());
    assert_eq!(api["connected"], false);

    // the retry form refetches and redirects back to the page
    let page = client.post(format!("{base}/refetch")).send().await?;
    assert!(page.status().is_success());
    let html = page.text().await?;
    assert!(html.contains("</span>Connected"));
    assert!(!html.contains("Disconnected"));
    assert!(!html.contains("Connection error"));

    let api: serde_json::Value = client.get(format!("{base}/api")).send().await?.json().await?;
    assert_eq!(api["status"], "live");
    assert_eq!(api["connected"], true);

    let snapshot = feed.snapshot().await;
    assert_eq!(snapshot.status, FeedStatus::Live);
    assert_eq!(snapshot.latest.map(|r| r.id), Some("b".to_string()));
    Ok(())
}
