//! ==============================================================================
//! feed.rs - SensorFeed: polling, merging and connection state
//! ==============================================================================
//!
//! purpose:
//!     owns the reading buffer and the single poll task that keeps it fresh.
//!     the dashboard only ever reads a FeedSnapshot; all mutation happens here.
//!
//! states:
//!
//! ```text
//! Initializing ──fetch ok──▶ Live ◀──fetch ok──┐
//!      │                      │                │
//!      └──fetch err──▶ Degraded ──fetch err────┘ (stays degraded)
//!
//! any state ──stop()/drop──▶ Stopped (terminal, no further mutation)
//! ```
//!
//! concurrency:
//!     - one poll task per feed, driven by tokio::time::interval
//!     - fetches go through a gate; a tick that finds it taken is skipped,
//!       a manual refetch waits for it
//!     - the poll task holds a Weak handle, dropping the last SensorFeed
//!       aborts it
//!
//! relationships:
//!     - uses: source.rs (ReadingSource), buffer.rs (merge step)
//!     - used by: main.rs (start), dashboard.rs (snapshot/refetch/clear_error)
//!
//! ==============================================================================

use crate::buffer::ReadingBuffer;
use crate::domain::Reading;
use crate::source::ReadingSource;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5000);
pub const DEFAULT_MAX_DATA_POINTS: usize = 20;

// ==============================================================================
// options & state
// ==============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeedOptions {
    pub poll_interval: Duration,
    pub max_data_points: usize,
}

impl Default for FeedOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_data_points: DEFAULT_MAX_DATA_POINTS,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedStatus {
    Initializing,
    Live,
    Degraded,
    Stopped,
}

#[derive(Debug)]
struct FeedState {
    buffer: ReadingBuffer,
    loading: bool,
    connected: bool,
    last_error: Option<String>,
    last_update: Option<DateTime<Utc>>,
    /// completed fetch attempts, successful or not
    attempts: u64,
}

/// read-only copy of the feed handed to the presentation layer
#[derive(Clone, Debug, Serialize)]
pub struct FeedSnapshot {
    pub status: FeedStatus,
    pub loading: bool,
    pub connected: bool,
    pub last_error: Option<String>,
    pub last_update: Option<DateTime<Utc>>,
    pub max_data_points: usize,
    pub readings: Vec<Reading>,
    pub latest: Option<Reading>,
    pub previous: Option<Reading>,
}

// ==============================================================================
// feed
// ==============================================================================

/// Clone-able handle; every clone drives the same buffer and poll task.
#[derive(Clone)]
pub struct SensorFeed {
    inner: Arc<Inner>,
}

struct Inner {
    source: Arc<dyn ReadingSource>,
    options: FeedOptions,
    state: RwLock<FeedState>,
    // held for the duration of one fetch-and-merge
    gate: Mutex<()>,
    alive: AtomicBool,
    poller: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl SensorFeed {
    /// create a feed in `Initializing`; nothing is fetched until `start`
    pub fn new(source: Arc<dyn ReadingSource>, options: FeedOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                options,
                state: RwLock::new(FeedState {
                    buffer: ReadingBuffer::new(options.max_data_points),
                    loading: true,
                    connected: false,
                    last_error: None,
                    last_update: None,
                    attempts: 0,
                }),
                gate: Mutex::new(()),
                alive: AtomicBool::new(true),
                poller: std::sync::Mutex::new(None),
            }),
        }
    }

    /// Fetch right away, then once per poll interval until stopped.
    ///
    /// Calling it again while the poll task runs, or after `stop`, does nothing.
    pub fn start(&self) {
        if !self.is_alive() {
            warn!("start() on a stopped feed ignored");
            return;
        }
        let mut poller = self.inner.lock_poller();
        if poller.is_some() {
            debug!("feed already polling");
            return;
        }

        let period = self.inner.options.poll_interval;
        let interval_ms = period.as_millis() as u64;
        info!(interval_ms, "starting sensor polling");
        *poller = Some(tokio::spawn(poll_loop(Arc::downgrade(&self.inner), period)));
    }

    /// Manual refresh: flags `loading` and fetches once, without touching the
    /// poll schedule. Waits for an in-flight fetch to finish first.
    pub async fn refetch(&self) {
        if !self.is_alive() {
            return;
        }
        self.inner.state.write().await.loading = true;

        let _gate = self.inner.gate.lock().await;
        // a tick that held the gate has cleared the flag on its way out
        {
            let mut state = self.inner.state.write().await;
            if !self.is_alive() {
                return;
            }
            state.loading = true;
        }
        self.inner.fetch_and_apply().await;
    }

    /// Dismiss the current error. Connection state and buffer are untouched.
    pub async fn clear_error(&self) {
        if !self.is_alive() {
            return;
        }
        self.inner.state.write().await.last_error = None;
    }

    /// Cancel the poll task. Fetches still in flight resolve into nothing.
    pub fn stop(&self) {
        if self.inner.alive.swap(false, Ordering::AcqRel) {
            info!("sensor feed stopped");
            self.inner.abort_poller();
        }
    }

    pub fn is_alive(&self) -> bool {
        self.inner.alive.load(Ordering::Acquire)
    }

    pub fn options(&self) -> FeedOptions {
        self.inner.options
    }

    pub async fn snapshot(&self) -> FeedSnapshot {
        let state = self.inner.state.read().await;
        let status = if !self.is_alive() {
            FeedStatus::Stopped
        } else if state.attempts == 0 {
            FeedStatus::Initializing
        } else if state.connected {
            FeedStatus::Live
        } else {
            FeedStatus::Degraded
        };

        FeedSnapshot {
            status,
            loading: state.loading,
            connected: state.connected,
            last_error: state.last_error.clone(),
            last_update: state.last_update,
            max_data_points: state.buffer.capacity(),
            readings: state.buffer.as_slice().to_vec(),
            latest: state.buffer.latest().cloned(),
            previous: state.buffer.previous().cloned(),
        }
    }
}

impl Inner {
    /// scheduled fetch; skipped when another fetch holds the gate
    async fn tick(&self) {
        let Ok(_gate) = self.gate.try_lock() else {
            debug!("fetch still in flight, skipping tick");
            return;
        };
        self.fetch_and_apply().await;
    }

    async fn fetch_and_apply(&self) {
        let result = self.source.fetch_readings().await;

        let mut state = self.state.write().await;
        // checked under the lock so nothing lands after stop() returns
        if !self.alive.load(Ordering::Acquire) {
            debug!("feed stopped while fetching, discarding result");
            return;
        }

        state.attempts += 1;
        state.loading = false;
        match result {
            Ok(readings) => {
                let received = readings.len();
                let outcome = state.buffer.merge(readings);
                debug!(
                    received,
                    appended = outcome.appended,
                    replaced = outcome.replaced,
                    stale = outcome.stale,
                    evicted = outcome.evicted,
                    buffered = state.buffer.len(),
                    "merged readings"
                );
                if !state.connected {
                    info!("connected to sensor api");
                }
                state.connected = true;
                state.last_error = None;
                state.last_update = Some(Utc::now());
            }
            Err(e) => {
                warn!(status = e.status(), "sensor fetch failed: {}", e);
                state.connected = false;
                state.last_error = Some(e.to_string());
            }
        }
    }

    fn lock_poller(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        // a poisoned slot still holds a valid handle
        self.poller.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn abort_poller(&self) {
        if let Some(handle) = self.lock_poller().take() {
            handle.abort();
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::Release);
        self.abort_poller();
    }
}

// ==============================================================================
// poll loop
// ==============================================================================

async fn poll_loop(feed: Weak<Inner>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    // a tick missed while a fetch was running is dropped, not replayed
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        // first tick completes immediately
        ticker.tick().await;

        let Some(inner) = feed.upgrade() else {
            break;
        };
        if !inner.alive.load(Ordering::Acquire) {
            break;
        }
        inner.tick().await;
    }
}
