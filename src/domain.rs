//! ==============================================================================
//! domain.rs - sensor reading model and pure helpers over readings
//! ==============================================================================
//!
//! purpose:
//!     wire/domain types shared by the source, the feed and the dashboard.
//!     also hosts the pure functions the presentation layer derives from
//!     feed state (trend between two values, air quality classification).
//!
//! relationships:
//!     - used by: source.rs (deserializes the /items response)
//!     - used by: buffer.rs, feed.rs (ordering by timestamp, identity by id)
//!     - used by: dashboard.rs (trend + air quality cards)
//!
//! ==============================================================================

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

// ==============================================================================
// wire types
// ==============================================================================

/// one sensor sample as published by the sensor api
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// opaque unique identifier
    pub id: String,
    /// capture instant, the only ordering key
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    /// informational, never enforced here
    #[serde(default)]
    pub ttl: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub device_type: String,
    #[serde(default)]
    pub status: String,
    /// temperature in celsius
    pub temperature: f64,
    /// relative humidity (0-100%)
    pub humidity: f64,
    /// particulate matter in μg/m³; all three zero means the pm sensor is idle
    #[serde(default)]
    pub pm1_0: f64,
    #[serde(default)]
    pub pm2_5: f64,
    #[serde(default)]
    pub pm10: f64,
    /// custom fields some devices attach, kept verbatim
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Reading {
    /// true when every particulate channel reports zero
    pub fn pm_inactive(&self) -> bool {
        self.pm1_0 == 0.0 && self.pm2_5 == 0.0 && self.pm10 == 0.0
    }

    pub fn is_active(&self) -> bool {
        self.status == "active"
    }
}

/// Parse an ISO-8601 instant. Timestamps without an offset are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    raw.parse::<NaiveDateTime>()
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp `{raw}`")))
}

/// true when there is data and no reading ever carried particulate values
pub fn pm_inactive(readings: &[Reading]) -> bool {
    !readings.is_empty() && readings.iter().all(Reading::pm_inactive)
}

// ==============================================================================
// trend
// ==============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

/// percentage change between two consecutive values
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Trend {
    /// absolute change in percent, rounded to one decimal
    pub magnitude: f64,
    pub direction: Direction,
}

impl Trend {
    /// `None` when there is no previous value or it is zero.
    pub fn between(current: f64, previous: Option<f64>) -> Option<Self> {
        let previous = previous.filter(|p| *p != 0.0)?;
        let change = (current - previous) / previous * 100.0;
        Some(Self {
            magnitude: (change.abs() * 10.0).round() / 10.0,
            direction: if change > 0.0 { Direction::Up } else { Direction::Down },
        })
    }

    pub fn arrow(&self) -> &'static str {
        match self.direction {
            Direction::Up => "↗",
            Direction::Down => "↘",
        }
    }
}

// ==============================================================================
// air quality
// ==============================================================================
// thresholds follow the us epa pm2.5 / pm10 breakpoints. both channels have to
// sit under a band for the reading to be classified into it.

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AirQuality {
    SensorInactive,
    Good,
    Moderate,
    UnhealthyForSensitive,
    Unhealthy,
    VeryUnhealthy,
}

impl AirQuality {
    pub fn classify(pm2_5: f64, pm10: f64) -> Self {
        if pm2_5 == 0.0 && pm10 == 0.0 {
            Self::SensorInactive
        } else if pm2_5 <= 12.0 && pm10 <= 50.0 {
            Self::Good
        } else if pm2_5 <= 35.0 && pm10 <= 100.0 {
            Self::Moderate
        } else if pm2_5 <= 55.0 && pm10 <= 150.0 {
            Self::UnhealthyForSensitive
        } else if pm2_5 <= 150.0 && pm10 <= 250.0 {
            Self::Unhealthy
        } else {
            Self::VeryUnhealthy
        }
    }

    pub fn of(reading: &Reading) -> Self {
        Self::classify(reading.pm2_5, reading.pm10)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::SensorInactive => "Sensor Inactive",
            Self::Good => "Good",
            Self::Moderate => "Moderate",
            Self::UnhealthyForSensitive => "Unhealthy for Sensitive Groups",
            Self::Unhealthy => "Unhealthy",
            Self::VeryUnhealthy => "Very Unhealthy",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Self::SensorInactive => "#6b7280",
            Self::Good => "#10b981",
            Self::Moderate => "#f59e0b",
            Self::UnhealthyForSensitive => "#f97316",
            Self::Unhealthy => "#ef4444",
            Self::VeryUnhealthy => "#991b1b",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::SensorInactive => "The particulate matter sensors are not reporting data",
            Self::Good => "Air quality is satisfactory",
            Self::Moderate => "Air quality is acceptable",
            Self::UnhealthyForSensitive => "Members of sensitive groups may experience health effects",
            Self::Unhealthy => "Everyone may begin to experience health effects",
            Self::VeryUnhealthy => "Health warning: everyone may experience serious effects",
        }
    }

    pub fn recommendations(&self) -> &'static [&'static str] {
        match self {
            Self::SensorInactive => &[
                "Check the particulate sensor wiring and power",
                "Temperature and humidity readings are still valid",
            ],
            Self::Good => &[
                "Ideal conditions for outdoor activities",
                "Ventilate indoor spaces freely",
            ],
            Self::Moderate => &[
                "Unusually sensitive people should limit prolonged exertion outdoors",
                "Keep windows closed during peak traffic hours",
            ],
            _ => &[
                "Avoid prolonged outdoor exertion",
                "Keep windows closed and run an air purifier",
                "Sensitive groups should stay indoors",
            ],
        }
    }
}
