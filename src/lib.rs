//! sensor-dashboard: polls an IoT sensor api and serves a live dashboard.
//!
//! The interesting part is [`feed::SensorFeed`], which keeps a bounded,
//! deduplicated, time-ordered buffer of [`domain::Reading`]s fresh on a fixed
//! schedule. Everything else is plumbing around it.

pub mod buffer;
pub mod config;
pub mod dashboard;
pub mod domain;
pub mod error;
pub mod feed;
pub mod source;

pub use buffer::{MergeOutcome, ReadingBuffer};
pub use domain::{AirQuality, Direction, Reading, Trend};
pub use error::SourceError;
pub use feed::{FeedOptions, FeedSnapshot, FeedStatus, SensorFeed};
pub use source::{HttpReadingSource, ReadingSource};
