//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `dashboard.toml`.
//!     loads configuration from file (or defaults), then lets environment
//!     variables override it. read once at startup.
//!
//! structure:
//!     - ApiConfig: Where the sensor api lives and how long one fetch may take.
//!     - PollingConfig: How often the feed polls and how much history it keeps.
//!     - ServerConfig: Where the dashboard listens.
//!     - LoggingConfig: Log filter.
//!
//! environment overrides:
//!     SENSOR_API_BASE_URL, SENSOR_POLLING_INTERVAL_MS, SENSOR_MAX_DATA_POINTS,
//!     SENSOR_REQUEST_TIMEOUT_MS, DASHBOARD_BIND
//!
//! ==============================================================================

use crate::feed::{FeedOptions, DEFAULT_MAX_DATA_POINTS, DEFAULT_POLL_INTERVAL};

use anyhow::{bail, Context};
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub const ENV_BASE_URL: &str = "SENSOR_API_BASE_URL";
pub const ENV_POLLING_INTERVAL: &str = "SENSOR_POLLING_INTERVAL_MS";
pub const ENV_MAX_DATA_POINTS: &str = "SENSOR_MAX_DATA_POINTS";
pub const ENV_REQUEST_TIMEOUT: &str = "SENSOR_REQUEST_TIMEOUT_MS";
pub const ENV_BIND: &str = "DASHBOARD_BIND";

/// below this the api gets hammered; allowed, but warned about
pub const MIN_RECOMMENDED_INTERVAL_MS: u64 = 1000;
/// below this the charts are not much of a history
pub const MIN_RECOMMENDED_DATA_POINTS: usize = 5;

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct DashboardConfig {
    pub api: ApiConfig,
    pub polling: PollingConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ApiConfig {
    /// required; no usable default exists
    pub base_url: String,
    pub request_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_ms: u64,
    pub max_data_points: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// print the newest reading to the console once per poll interval
    pub show_sensor_data: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            request_timeout_ms: 10_000,
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            max_data_points: DEFAULT_MAX_DATA_POINTS,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3000".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            show_sensor_data: false,
        }
    }
}

impl DashboardConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file {}", path.as_ref().display()))?;

        toml::from_str(&content).context("Failed to parse config")
    }

    /// Load with default fallback
    pub fn load_or_default() -> Self {
        let paths = [
            std::path::PathBuf::from("config").join("dashboard.toml"),
            std::path::PathBuf::from("..").join("config").join("dashboard.toml"),
        ];

        for path in &paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(config) => {
                        println!("[CONFIG] Loaded from {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        println!("[CONFIG] Warning: Failed to load {}: {:#}", path.display(), e);
                    }
                }
            }
        }

        println!("[CONFIG] No config file found - using defaults");
        Self::default()
    }

    /// Overlay the process environment
    pub fn apply_env(&mut self) -> anyhow::Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Overlay values from `lookup`; unparsable numbers are an error.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_BASE_URL) {
            self.api.base_url = url.trim().to_string();
        }
        if let Some(ms) = parse_var(&lookup, ENV_POLLING_INTERVAL)? {
            self.polling.interval_ms = ms;
        }
        if let Some(points) = parse_var(&lookup, ENV_MAX_DATA_POINTS)? {
            self.polling.max_data_points = points;
        }
        if let Some(ms) = parse_var(&lookup, ENV_REQUEST_TIMEOUT)? {
            self.api.request_timeout_ms = ms;
        }
        if let Some(bind) = lookup(ENV_BIND) {
            self.server.bind = bind;
        }
        Ok(())
    }

    /// Reject unusable settings; returns warnings for merely unwise ones.
    pub fn validate(&self) -> anyhow::Result<Vec<String>> {
        if self.api.base_url.trim().is_empty() {
            bail!("{ENV_BASE_URL} is required (or api.base_url in dashboard.toml)");
        }
        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://") {
            bail!("api base url must be http(s), got {:?}", self.api.base_url);
        }
        if self.polling.interval_ms == 0 {
            bail!("polling interval must be greater than zero");
        }
        if self.polling.max_data_points == 0 {
            bail!("max data points must be at least 1");
        }
        if self.api.request_timeout_ms == 0 {
            bail!("request timeout must be greater than zero");
        }

        let mut warnings = Vec::new();
        if self.polling.interval_ms < MIN_RECOMMENDED_INTERVAL_MS {
            warnings.push(format!(
                "polling interval of {} ms is very low, at least {} ms is recommended",
                self.polling.interval_ms, MIN_RECOMMENDED_INTERVAL_MS
            ));
        }
        if self.polling.max_data_points < MIN_RECOMMENDED_DATA_POINTS {
            warnings.push(format!(
                "max data points of {} is very low, at least {} is recommended",
                self.polling.max_data_points, MIN_RECOMMENDED_DATA_POINTS
            ));
        }
        Ok(warnings)
    }

    pub fn feed_options(&self) -> FeedOptions {
        FeedOptions {
            poll_interval: Duration::from_millis(self.polling.interval_ms),
            max_data_points: self.polling.max_data_points,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.api.request_timeout_ms)
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        println!("┌─────────────────────────────────────────┐");
        println!("│         DASHBOARD CONFIGURATION         │");
        println!("├─────────────────────────────────────────┤");
        println!("│ API: {}", self.api.base_url);
        println!("│ Poll Interval: {} ms", self.polling.interval_ms);
        println!("│ Max Data Points: {}", self.polling.max_data_points);
        println!("│ Request Timeout: {} ms", self.api.request_timeout_ms);
        println!("│ Listen: {}", self.server.bind);
        println!("│ Log Level: {}", self.logging.level);
        println!("└─────────────────────────────────────────┘");
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> anyhow::Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(key)
        .map(|raw| raw.trim().parse::<T>().with_context(|| format!("{key}={raw:?} is not a valid number")))
        .transpose()
}
