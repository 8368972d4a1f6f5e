//! ==============================================================================
//! main.rs - sensor dashboard entry point
//! ==============================================================================
//!
//! purpose:
//!     polls a remote sensor api for temperature, humidity and particulate
//!     readings and serves them as a live web dashboard.
//!
//! responsibilities:
//!     - load configuration (dashboard.toml + environment)
//!     - install logging
//!     - build the http reading source and the sensor feed
//!     - start the feed's poll task
//!     - serve the dashboard until ctrl-c, then stop the feed
//!
//! architecture:
//!
//!     ┌─────────────────────────────────────────────────────────────┐
//!     │                      rust host (this file)                   │
//!     │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐  │
//!     │  │ poll task   │  │ web server  │  │ console reporter    │  │
//!     │  │ (feed.rs)   │  │ (port 3000) │  │ (optional)          │  │
//!     │  └──────┬──────┘  └──────┬──────┘  └──────────┬──────────┘  │
//!     │         │ writes         │ reads              │ reads       │
//!     │         └────────────────┼────────────────────┘             │
//!     │                    ┌─────┴─────┐                            │
//!     │                    │ FeedState │ <- Arc<RwLock<..>>         │
//!     │                    └───────────┘                            │
//!     └──────────────────────────┬──────────────────────────────────┘
//!                                │ GET {base_url}/items
//!                                ▼
//!                         ┌─────────────┐
//!                         │ sensor api  │
//!                         └─────────────┘
//!
//! ==============================================================================

use anyhow::Result;
use sensor_dashboard::config::DashboardConfig;
use sensor_dashboard::domain::AirQuality;
use sensor_dashboard::{dashboard, HttpReadingSource, SensorFeed};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // startup banner
    println!("===========================================================");
    println!("  IoT Sensor Dashboard");
    println!("  Temperature · Humidity · Air Quality");
    println!("===========================================================");

    // step 1: load configuration, environment wins over the file
    let mut config = DashboardConfig::load_or_default();
    config.apply_env()?;

    // step 2: logging (RUST_LOG overrides the configured level)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let warnings = match config.validate() {
        Ok(warnings) => warnings,
        Err(e) => {
            error!("invalid configuration: {:#}", e);
            return Err(e);
        }
    };
    for warning in &warnings {
        warn!("{}", warning);
    }
    config.print_summary();

    // step 3: source + feed
    let source = HttpReadingSource::new(&config.api.base_url, config.request_timeout());
    info!(url = source.items_url(), "polling sensor api");
    let feed = SensorFeed::new(Arc::new(source), config.feed_options());
    feed.start();

    // step 4: console reporter
    if config.logging.show_sensor_data {
        tokio::spawn(report_latest(feed.clone()));
    }

    // step 5: web server until ctrl-c
    let web_feed = feed.clone();
    let bind = config.server.bind.clone();
    let server = tokio::spawn(async move { dashboard::serve(web_feed, &bind).await });

    tokio::select! {
        result = server => {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("web server error: {:#}", e),
                Err(e) => error!("web server task failed: {}", e),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown requested");
        }
    }

    feed.stop();
    Ok(())
}

/// log the newest reading once per poll interval
async fn report_latest(feed: SensorFeed) {
    let mut ticker = tokio::time::interval(feed.options().poll_interval);
    let mut last_seen = None;

    while feed.is_alive() {
        ticker.tick().await;
        let snapshot = feed.snapshot().await;
        let Some(latest) = snapshot.latest else {
            continue;
        };
        if last_seen.as_ref() == Some(&(latest.id.clone(), latest.timestamp)) {
            continue;
        }

        info!(
            "[{}] Temp: {:.1}°C | Humidity: {:.1}% | PM2.5: {:.1} ({})",
            latest.name,
            latest.temperature,
            latest.humidity,
            latest.pm2_5,
            AirQuality::of(&latest).label()
        );
        last_seen = Some((latest.id, latest.timestamp));
    }
}
