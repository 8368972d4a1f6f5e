//! ==============================================================================
//! dashboard.rs - web server: html dashboard and json api over the feed
//! ==============================================================================
//!
//! purpose:
//!     stateless presentation of a FeedSnapshot. nothing here mutates feed
//!     state directly; the only write paths are the two recovery actions
//!     (refetch, clear error) which go through SensorFeed.
//!
//! routes:
//!     GET  /                  html dashboard (auto refresh at poll interval)
//!     POST /refetch           form action, redirects back to /
//!     POST /clear-error       form action, redirects back to /
//!     GET  /api               FeedSnapshot as json
//!     POST /api/refetch       manual refetch, returns the new snapshot
//!     POST /api/clear-error   dismiss error, returns the new snapshot
//!
//! ==============================================================================

use crate::domain::{pm_inactive, AirQuality, Reading, Trend};
use crate::feed::{FeedSnapshot, FeedStatus, SensorFeed};

use axum::{
    extract::State,
    response::{Html, Json, Redirect},
    routing::{get, post},
    Router,
};
use std::fmt::Write as _;
use tower_http::cors::CorsLayer;
use tracing::info;

// ==============================================================================
// server
// ==============================================================================

pub fn router(feed: SensorFeed) -> Router {
    Router::new()
        .route("/", get(dashboard_handler))
        .route("/refetch", post(refetch_form_handler))
        .route("/clear-error", post(clear_error_form_handler))
        .route("/api", get(api_handler))
        .route("/api/refetch", post(api_refetch_handler))
        .route("/api/clear-error", post(api_clear_error_handler))
        .layer(CorsLayer::permissive())
        .with_state(feed)
}

pub async fn serve(feed: SensorFeed, bind: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("dashboard live at http://{}", listener.local_addr()?);
    axum::serve(listener, router(feed)).await?;
    Ok(())
}

async fn dashboard_handler(State(feed): State<SensorFeed>) -> Html<String> {
    let refresh_secs = feed.options().poll_interval.as_secs().max(1);
    Html(render_dashboard(&feed.snapshot().await, refresh_secs))
}

/// json api endpoint for programmatic access
async fn api_handler(State(feed): State<SensorFeed>) -> Json<FeedSnapshot> {
    Json(feed.snapshot().await)
}

async fn api_refetch_handler(State(feed): State<SensorFeed>) -> Json<FeedSnapshot> {
    feed.refetch().await;
    Json(feed.snapshot().await)
}

async fn api_clear_error_handler(State(feed): State<SensorFeed>) -> Json<FeedSnapshot> {
    feed.clear_error().await;
    Json(feed.snapshot().await)
}

async fn refetch_form_handler(State(feed): State<SensorFeed>) -> Redirect {
    feed.refetch().await;
    Redirect::to("/")
}

async fn clear_error_form_handler(State(feed): State<SensorFeed>) -> Redirect {
    feed.clear_error().await;
    Redirect::to("/")
}

// ==============================================================================
// rendering
// ==============================================================================

/// Render the whole page for one snapshot.
pub fn render_dashboard(snapshot: &FeedSnapshot, refresh_secs: u64) -> String {
    let mut body = String::new();

    render_header(&mut body, snapshot);

    if let Some(error) = &snapshot.last_error {
        let _ = write!(
            body,
            r#"<div class="alert"><strong>Connection error</strong><p>{}</p>
<form method="post" action="/refetch"><button>Retry</button></form>
<form method="post" action="/clear-error"><button>Dismiss</button></form></div>"#,
            html_escape(error)
        );
    }

    if snapshot.loading && snapshot.readings.is_empty() {
        body.push_str(r#"<p class="muted">Connecting to IoT sensors...</p>"#);
    }

    if let Some(latest) = &snapshot.latest {
        render_cards(&mut body, latest, snapshot.previous.as_ref());
        render_air_quality(&mut body, latest, &snapshot.readings);
    }

    render_charts(&mut body, &snapshot.readings);

    if let Some(latest) = &snapshot.latest {
        render_device(&mut body, latest);
    }

    format!(
        r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<meta http-equiv="refresh" content="{refresh_secs}">
<title>IoT Dashboard</title>
<style>{STYLE}</style>
</head>
<body>
{body}
<footer class="muted">IoT Dashboard - refreshed every {refresh_secs}s, last {max} readings</footer>
</body>
</html>"#,
        max = snapshot.max_data_points,
    )
}

fn render_header(out: &mut String, snapshot: &FeedSnapshot) {
    let (dot, label) = match snapshot.status {
        FeedStatus::Initializing => ("#9ca3af", "Connecting"),
        FeedStatus::Live => ("#10b981", "Connected"),
        FeedStatus::Degraded => ("#ef4444", "Disconnected"),
        FeedStatus::Stopped => ("#6b7280", "Stopped"),
    };
    let updated = snapshot
        .last_update
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "never".to_string());

    let _ = write!(
        out,
        r#"<header><h1>IoT Dashboard</h1><p class="muted">Temperature, humidity and air quality in real time</p>
<p><span class="dot" style="background:{dot}"></span>{label}{loading} <span class="muted">updated {updated}</span></p></header>"#,
        loading = if snapshot.loading { " (loading...)" } else { "" },
    );
}

fn render_cards(out: &mut String, latest: &Reading, previous: Option<&Reading>) {
    out.push_str(r#"<section class="grid">"#);
    stat_card(
        out,
        "Temperature",
        &format!("{:.1}", latest.temperature),
        "°C",
        "#ef4444",
        Trend::between(latest.temperature, previous.map(|p| p.temperature)),
    );
    stat_card(
        out,
        "Humidity",
        &format!("{:.1}", latest.humidity),
        "%",
        "#06b6d4",
        Trend::between(latest.humidity, previous.map(|p| p.humidity)),
    );
    stat_card(
        out,
        "PM2.5",
        &format!("{:.1}", latest.pm2_5),
        "μg/m³",
        "#f59e0b",
        Trend::between(latest.pm2_5, previous.map(|p| p.pm2_5)),
    );
    stat_card(out, "Location", &html_escape(&latest.location), "", "#8b5cf6", None);
    stat_card(
        out,
        "Status",
        if latest.is_active() { "Active" } else { "Inactive" },
        "",
        "#10b981",
        None,
    );
    out.push_str("</section>");
}

fn stat_card(out: &mut String, title: &str, value: &str, unit: &str, color: &str, trend: Option<Trend>) {
    let trend = trend
        .map(|t| {
            let class = match t.direction {
                crate::domain::Direction::Up => "up",
                crate::domain::Direction::Down => "down",
            };
            format!(r#"<p class="trend {class}">{} {}% vs previous</p>"#, t.arrow(), t.magnitude)
        })
        .unwrap_or_default();

    let _ = write!(
        out,
        r#"<div class="card" style="border-left-color:{color}"><p class="muted">{title}</p><p class="value">{value}<span class="unit">{unit}</span></p>{trend}</div>"#
    );
}

fn render_air_quality(out: &mut String, latest: &Reading, readings: &[Reading]) {
    let level = AirQuality::of(latest);
    let _ = write!(
        out,
        r#"<section class="card" style="border-left-color:{color}"><h2>Air quality: <span style="color:{color}">{label}</span></h2><p>{desc}</p>
<p>PM1.0 {pm1:.1} · PM2.5 {pm25:.1} · PM10 {pm10:.1} μg/m³</p><ul>"#,
        color = level.color(),
        label = level.label(),
        desc = level.description(),
        pm1 = latest.pm1_0,
        pm25 = latest.pm2_5,
        pm10 = latest.pm10,
    );
    for tip in level.recommendations() {
        let _ = write!(out, "<li>{tip}</li>");
    }
    out.push_str("</ul>");
    if pm_inactive(readings) {
        out.push_str(r#"<p class="muted">No particulate data in the current window: the PM sensor appears inactive.</p>"#);
    }
    out.push_str("</section>");
}

fn render_charts(out: &mut String, readings: &[Reading]) {
    if readings.is_empty() {
        return;
    }
    out.push_str(r#"<section class="grid charts">"#);
    chart(out, "Temperature (°C)", "#ef4444", readings, |r| r.temperature);
    chart(out, "Humidity (%)", "#06b6d4", readings, |r| r.humidity);
    chart(out, "PM2.5 (μg/m³)", "#f59e0b", readings, |r| r.pm2_5);
    chart(out, "PM10 (μg/m³)", "#8b5cf6", readings, |r| r.pm10);
    out.push_str("</section>");
}

fn chart(out: &mut String, title: &str, color: &str, readings: &[Reading], value: impl Fn(&Reading) -> f64) {
    let values: Vec<f64> = readings.iter().map(value).collect();
    let first = readings.first().map(|r| r.timestamp.format("%H:%M:%S").to_string());
    let last = readings.last().map(|r| r.timestamp.format("%H:%M:%S").to_string());
    let _ = write!(
        out,
        r#"<div class="card"><p class="muted">{title}</p>{svg}<p class="axis"><span>{}</span><span>{}</span></p></div>"#,
        first.unwrap_or_default(),
        last.unwrap_or_default(),
        svg = sparkline(&values, color),
    );
}

const CHART_W: f64 = 300.0;
const CHART_H: f64 = 80.0;

/// Inline svg polyline scaled to the min/max of `values`.
pub fn sparkline(values: &[f64], color: &str) -> String {
    if values.is_empty() {
        return String::new();
    }
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = if max > min { max - min } else { 1.0 };
    let step = if values.len() > 1 { CHART_W / (values.len() - 1) as f64 } else { 0.0 };

    let points: Vec<String> = values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let x = i as f64 * step;
            // flat series sit in the middle
            let y = if max > min { CHART_H - (v - min) / span * CHART_H } else { CHART_H / 2.0 };
            format!("{x:.1},{y:.1}")
        })
        .collect();

    format!(
        r#"<svg viewBox="0 0 {CHART_W} {CHART_H}" preserveAspectRatio="none"><polyline fill="none" stroke="{color}" stroke-width="2" points="{}"/></svg>"#,
        points.join(" ")
    )
}

fn render_device(out: &mut String, latest: &Reading) {
    let _ = write!(
        out,
        r#"<section class="card"><h2>Device</h2><div class="grid">
<div><p class="muted">Sensor name</p><p>{}</p></div>
<div><p class="muted">Device ID</p><p>{}</p></div>
<div><p class="muted">Device type</p><p>{}</p></div>
<div><p class="muted">TTL</p><p>{}</p></div></div></section>"#,
        html_escape(&latest.name),
        html_escape(&latest.id),
        html_escape(&latest.device_type),
        latest.ttl,
    );
}

/// escape html special characters to prevent xss
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

const STYLE: &str = "
body { font-family: system-ui; margin: 0 auto; max-width: 72rem; padding: 1.5rem; background: #f9fafb; color: #111827; }
.muted { color: #6b7280; font-size: .875rem; }
.dot { display: inline-block; width: .75rem; height: .75rem; border-radius: 50%; margin-right: .5rem; }
.grid { display: grid; grid-template-columns: repeat(auto-fit, minmax(12rem, 1fr)); gap: 1rem; margin-bottom: 1.5rem; }
.card { background: #fff; border-radius: .5rem; box-shadow: 0 1px 3px #0002; padding: 1rem; border-left: 4px solid #e5e7eb; margin-bottom: 1rem; }
.value { font-size: 1.875rem; font-weight: 700; margin: .25rem 0; }
.unit { font-size: 1rem; color: #6b7280; margin-left: .25rem; }
.trend.up { color: #059669; } .trend.down { color: #dc2626; }
.alert { background: #fef2f2; border: 1px solid #fecaca; border-radius: .5rem; padding: 1rem; margin-bottom: 1.5rem; }
.alert form { display: inline; }
.axis { display: flex; justify-content: space-between; color: #9ca3af; font-size: .75rem; }
svg { width: 100%; height: 5rem; }
";

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> FeedSnapshot {
        FeedSnapshot {
            status: FeedStatus::Degraded,
            loading: false,
            connected: false,
            last_error: Some("HTTP error: 503 - <Service Unavailable>".to_string()),
            last_update: None,
            max_data_points: 20,
            readings: Vec::new(),
            latest: None,
            previous: None,
        }
    }

    #[test]
    fn error_banner_is_escaped() {
        let html = render_dashboard(&snapshot(), 5);
        assert!(html.contains("&lt;Service Unavailable&gt;"));
        assert!(html.contains("Disconnected"));
        assert!(html.contains(r#"action="/clear-error""#));
    }

    #[test]
    fn flat_sparkline_sits_mid_height() {
        let svg = sparkline(&[3.0, 3.0], "#000");
        assert!(svg.contains(r#"points="0.0,40.0 300.0,40.0""#));
    }

    #[test]
    fn sparkline_scales_to_range() {
        let svg = sparkline(&[0.0, 10.0], "#000");
        assert!(svg.contains(r#"points="0.0,80.0 300.0,0.0""#));
        assert!(sparkline(&[], "#000").is_empty());
    }
}
