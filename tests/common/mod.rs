//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sensor_dashboard::{Reading, ReadingSource, SourceError};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

pub fn t0() -> DateTime<Utc> {
    "2024-01-01T00:00:00Z".parse().unwrap()
}

/// a reading `secs` seconds after 2024-01-01T00:00:00Z
pub fn reading(id: &str, secs: i64, temperature: f64) -> Reading {
    Reading {
        id: id.to_string(),
        timestamp: t0() + Duration::seconds(secs),
        ttl: 86_400,
        name: "Sensor Sala".to_string(),
        location: "Living room".to_string(),
        device_type: "ESP32".to_string(),
        status: "active".to_string(),
        temperature,
        humidity: 50.0,
        pm1_0: 0.0,
        pm2_5: 0.0,
        pm10: 0.0,
        extra: Default::default(),
    }
}

pub fn http_503() -> SourceError {
    SourceError::HttpStatus {
        status: 503,
        message: "Service Unavailable".to_string(),
    }
}

/// Replays a script of outcomes, one per fetch; an exhausted script answers
/// with an empty batch. Optionally every fetch first waits for a permit.
#[derive(Default)]
pub struct FakeSource {
    script: Mutex<VecDeque<Result<Vec<Reading>, SourceError>>>,
    calls: AtomicUsize,
    gate: Option<Arc<Semaphore>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then_ok(self, readings: Vec<Reading>) -> Self {
        self.script.lock().unwrap().push_back(Ok(readings));
        self
    }

    pub fn then_err(self, err: SourceError) -> Self {
        self.script.lock().unwrap().push_back(Err(err));
        self
    }

    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// fetches started so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn wait_for_calls(&self, n: usize) {
        while self.calls() < n {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl ReadingSource for FakeSource {
    async fn fetch_readings(&self) -> Result<Vec<Reading>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

/// Serve `app` on an ephemeral local port and return its base url.
pub async fn spawn_server(app: axum::Router) -> anyhow::Result<String> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{addr}"))
}
