//! ==============================================================================
//! server.rs - dashboard web server
//! ==============================================================================
//!
//! purpose:
//!     the presenter side of the boundary. every request reads the latest
//!     published snapshot; nothing here mutates monitor state.
//!
//! routes:
//!     GET /               server-rendered html dashboard (refreshes itself)
//!     GET /api            snapshot plus the presenter getters as json
//!     GET /api/crossings  configured crossing markers
//!
//! ==============================================================================

use crate::animator::SignalPhase;
use crate::domain::{SignalCategory, SignalStatus};
use crate::presenter::DashboardSnapshot;

use anyhow::{Context, Result};
use axum::{
    extract::State,
    response::{Html, Json},
    routing::get,
    Router,
};
use serde_json::{json, Value};
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tracing::info;

type Snapshots = watch::Receiver<DashboardSnapshot>;

pub fn router(snapshots: Snapshots) -> Router {
    Router::new()
        .route("/", get(dashboard_handler))
        .route("/api", get(api_handler))
        .route("/api/crossings", get(crossings_handler))
        .layer(CorsLayer::permissive())
        .with_state(snapshots)
}

pub async fn run_server(bind: &str, snapshots: Snapshots) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {}", bind))?;
    info!("[SERVER] Dashboard live at http://{}", bind);
    axum::serve(listener, router(snapshots)).await?;
    Ok(())
}

/// json api endpoint for programmatic access
async fn api_handler(State(snapshots): State<Snapshots>) -> Json<Value> {
    let snap = snapshots.borrow().clone();
    Json(api_view(&snap))
}

async fn crossings_handler(State(snapshots): State<Snapshots>) -> Json<Value> {
    let crossings = snapshots.borrow().crossings.clone();
    Json(json!(crossings))
}

fn api_view(snap: &DashboardSnapshot) -> Value {
    json!({
        "snapshot": snap,
        "marker_position": snap.marker_position(),
        "track_polyline": snap.track_polyline(),
        "signal_category": snap.signal_category(),
        "displayed_time": snap.displayed_time(),
        "gate_angle": snap.gate_angle(),
        "speed": snap.speed_label(),
    })
}

async fn dashboard_handler(State(snapshots): State<Snapshots>) -> Html<String> {
    let snap = snapshots.borrow().clone();
    Html(render_dashboard(&snap))
}

fn render_dashboard(snap: &DashboardSnapshot) -> String {
    let (label, colour) = match snap.signal_category() {
        SignalCategory::Clear => ("Crossing is clear", "#2ecc71"),
        SignalCategory::Approaching => ("Train is approaching", "#f1c40f"),
        SignalCategory::Occupied => ("Train present at crossing", "#e74c3c"),
        SignalCategory::Unknown => ("Status unknown", "#888"),
    };

    let crossings: String = snap
        .crossings
        .iter()
        .map(|c| format!("<li>{} ({:.6}, {:.6})</li>", html_escape(&c.name), c.lat, c.lon))
        .collect();

    let lights = render_lights(snap);
    let cycle = match snap.signal.cycle {
        Some(cycle) => format!(
            r#"<div style="background: #16213e; padding: 8px 16px; border-radius: 8px; max-width: 320px;">
        <div><strong>Green Cycle:</strong> {:.0}s</div>
        <div><strong>Red Cycle:</strong> {:.0}s</div>
        <div><strong>Total Cycle:</strong> {:.0}s</div>
    </div>"#,
            cycle.green_seconds, cycle.red_seconds, cycle.total_cycle
        ),
        None => String::new(),
    };

    let position = snap.marker_position();
    format!(
        r#"<!doctype html>
<html>
<head>
<title>grade crossing monitor</title>
<meta http-equiv="refresh" content="1">
</head>
<body style="font-family: system-ui; padding: 2rem; background: #1a1a2e; color: #eee;">
    <h1>Train Tracking</h1>
    <div style="background: #a03636; padding: 12px 20px; border-radius: 8px; max-width: 320px;">
        <div><strong>Train ID:</strong> {train_id}</div>
        <div><strong>Latitude:</strong> {lat:.6}</div>
        <div><strong>Longitude:</strong> {lon:.6}</div>
        <div><strong>Speed:</strong> {speed}</div>
        <div><strong>Updated:</strong> {updated}</div>
        <div><strong>Track points:</strong> {track}</div>
    </div>
    <h1>Grade Crossing Signal</h1>
    <div style="font-size: 3rem; color: {colour};">{time}</div>
    <div>seconds remaining &middot; {label}</div>
    <div>gate arm: {gate:.0}&deg;</div>
    {lights}
    {cycle}
    <h2>Crossings</h2>
    <ul>{crossings}</ul>
</body>
</html>"#,
        train_id = html_escape(&snap.train.train_id),
        lat = position.lat,
        lon = position.lon,
        speed = snap.speed_label(),
        updated = html_escape(&snap.train.updated),
        track = snap.track_polyline().len(),
        colour = colour,
        time = snap.displayed_time(),
        label = label,
        gate = snap.gate_angle(),
        crossings = crossings,
        lights = lights,
        cycle = cycle,
    )
}

/// one row per light; the simulated phase or the live light is marked ACTIVE
fn render_lights(snap: &DashboardSnapshot) -> String {
    let active = match snap.signal.phase {
        Some(SignalPhase::Green) => SignalStatus::Green,
        Some(SignalPhase::Red) => SignalStatus::Red,
        None => snap.signal.light,
    };
    [(SignalStatus::Red, "RED", "#e74c3c"), (SignalStatus::Green, "GREEN", "#2ecc71")]
        .iter()
        .map(|(status, name, colour)| {
            if *status == active {
                format!(r#"<div style="color: {};">{} &#9679; ACTIVE</div>"#, colour, name)
            } else {
                format!(r#"<div style="color: #555;">{}</div>"#, name)
            }
        })
        .collect()
}

/// escape html special characters to prevent xss
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MonitorConfig, SourceMode};
    use crate::monitor::CrossingView;

    fn snapshot() -> DashboardSnapshot {
        CrossingView::new(&MonitorConfig::default()).snapshot()
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("<b>\"a&b\"</b>"), "&lt;b&gt;&quot;a&amp;b&quot;&lt;/b&gt;");
    }

    #[test]
    fn test_dashboard_escapes_train_id() {
        let mut snap = snapshot();
        snap.train.train_id = "<script>".to_string();
        let html = render_dashboard(&snap);
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("Railroad Crossing #85"));
    }

    #[test]
    fn test_dashboard_shows_simulated_cycle() {
        let mut config = MonitorConfig::default();
        config.signal.mode = SourceMode::Simulated;
        let html = render_dashboard(&CrossingView::new(&config).snapshot());
        assert!(html.contains("<strong>Green Cycle:</strong> 30s"));
        assert!(html.contains("<strong>Red Cycle:</strong> 25s"));
        assert!(html.contains("<strong>Total Cycle:</strong> 55s"));
        assert!(html.contains("GREEN &#9679; ACTIVE"));
        assert!(!html.contains("RED &#9679; ACTIVE"));
    }

    #[test]
    fn test_live_dashboard_has_no_cycle_panel() {
        let html = render_dashboard(&snapshot());
        assert!(!html.contains("Total Cycle"));
        assert!(!html.contains("ACTIVE"));
    }

    #[test]
    fn test_api_view_exposes_getters() {
        let view = api_view(&snapshot());
        assert_eq!(view["displayed_time"], "0.0");
        assert_eq!(view["signal_category"], "unknown");
        assert_eq!(view["gate_angle"], 90.0);
        assert_eq!(view["speed"], "N/A");
        assert_eq!(view["snapshot"]["train"]["train_id"], "unknown");
        assert!(view["track_polyline"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_api_handler_reads_latest() {
        let (tx, rx) = watch::channel(snapshot());
        let mut next = snapshot();
        next.gate_angle = 12.0;
        tx.send_replace(next);
        let Json(body) = api_handler(State(rx)).await;
        assert_eq!(body["gate_angle"], 12.0);
    }
}
