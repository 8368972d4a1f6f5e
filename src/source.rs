//! ==============================================================================
//! source.rs - the reading source seam and its http implementation
//! ==============================================================================
//!
//! purpose:
//!     one network round trip: `GET {base_url}/items` and hand back the list
//!     of readings, or a SourceError. no retries and no caching here; retry
//!     policy belongs to the feed (it simply polls again on the next tick).
//!
//! relationships:
//!     - used by: feed.rs (SensorFeed holds an `Arc<dyn ReadingSource>`)
//!     - built by: main.rs (from config.rs `ApiConfig`)
//!     - tests substitute their own ReadingSource impls
//!
//! ==============================================================================

use crate::domain::Reading;
use crate::error::{Result, SourceError};

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use std::time::Duration;
use tracing::{debug, warn};

/// path of the collection endpoint, appended to the base url
pub const ITEMS_ENDPOINT: &str = "/items";

// ==============================================================================
// trait
// ==============================================================================

#[async_trait]
pub trait ReadingSource: Send + Sync {
    /// fetch every reading the api currently publishes
    async fn fetch_readings(&self) -> Result<Vec<Reading>>;

    /// fetch everything and pick one sensor out of it
    async fn fetch_reading(&self, id: &str) -> Result<Option<Reading>> {
        let readings = self.fetch_readings().await?;
        Ok(readings.into_iter().find(|r| r.id == id))
    }
}

// ==============================================================================
// http implementation
// ==============================================================================

#[derive(Clone, Debug)]
pub struct HttpReadingSource {
    client: reqwest::Client,
    items_url: String,
    timeout: Duration,
}

impl HttpReadingSource {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, timeout)
    }

    pub fn with_client(client: reqwest::Client, base_url: &str, timeout: Duration) -> Self {
        Self {
            client,
            items_url: format!("{}{}", base_url.trim_end_matches('/'), ITEMS_ENDPOINT),
            timeout,
        }
    }

    pub fn items_url(&self) -> &str {
        &self.items_url
    }

    async fn round_trip(&self) -> Result<Vec<Reading>> {
        let response = self
            .client
            .get(&self.items_url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| self.client_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::HttpStatus {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("Unknown Status").to_string(),
            });
        }

        let body = response.bytes().await.map_err(|e| self.client_error(e))?;
        parse_items(&body)
    }

    fn client_error(&self, e: reqwest::Error) -> SourceError {
        if e.is_timeout() {
            SourceError::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else {
            SourceError::Transport {
                message: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl ReadingSource for HttpReadingSource {
    async fn fetch_readings(&self) -> Result<Vec<Reading>> {
        // the bound covers connect, headers and body
        match tokio::time::timeout(self.timeout, self.round_trip()).await {
            Ok(result) => result,
            Err(_) => Err(SourceError::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
            }),
        }
    }
}

/// Decode a `{ items: Reading[], count }` body.
///
/// A body without an `items` array is an error. Individual items that do not
/// decode are logged and skipped.
pub fn parse_items(body: &[u8]) -> Result<Vec<Reading>> {
    let mut value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| SourceError::format(format!("body is not valid JSON ({e})")))?;

    let items = match value.get_mut("items").map(serde_json::Value::take) {
        Some(serde_json::Value::Array(items)) => items,
        Some(_) => return Err(SourceError::format("expected `items` to be an array")),
        None => return Err(SourceError::format("missing `items` array")),
    };

    let total = items.len();
    let readings: Vec<Reading> = items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value(item) {
            Ok(reading) => Some(reading),
            Err(e) => {
                warn!(index, "skipping malformed reading: {}", e);
                None
            }
        })
        .collect();

    if readings.len() < total {
        debug!(total, kept = readings.len(), "dropped malformed readings");
    }
    Ok(readings)
}
