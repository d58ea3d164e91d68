//! ==============================================================================
//! presenter.rs - read-only snapshot handed to whatever draws the dashboard
//! ==============================================================================
//!
//! purpose:
//!     the monitor publishes one DashboardSnapshot after every tick and every
//!     applied event. a presenter reads it on each repaint through the getters
//!     below; it never calls back into the core.
//!
//! relationships:
//!     - built by: monitor.rs (CrossingView::snapshot)
//!     - read by: server.rs (html dashboard and /api)
//!
//! ==============================================================================

use crate::animator::SignalPhase;
use crate::config::{Crossing, TimeFormat};
use crate::domain::{Coordinate, SignalCategory, SignalStatus};
use crate::poller::FeedHealth;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainPanel {
    pub train_id: String,
    pub position: Coordinate,
    pub speed: Option<f64>,
    pub linestring: Option<Vec<Coordinate>>,
    /// raw timestamp token of the record on screen
    pub updated: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalPanel {
    pub category: SignalCategory,
    pub displayed_seconds: f64,
    pub is_counting: bool,
    pub light: SignalStatus,
    pub sentence: Option<String>,
    /// only set when the signal is simulated
    pub phase: Option<SignalPhase>,
    /// only set when the signal is simulated
    pub cycle: Option<CyclePanel>,
    pub updated: String,
}

/// configured GREEN/RED lengths of the local signal cycle
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CyclePanel {
    pub green_seconds: f64,
    pub red_seconds: f64,
    pub total_cycle: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSnapshot {
    pub train: TrainPanel,
    pub signal: SignalPanel,
    pub gate_angle: f64,
    pub train_health: FeedHealth,
    pub signal_health: FeedHealth,
    pub crossings: Vec<Crossing>,
    #[serde(skip)]
    pub time_format: TimeFormat,
}

impl DashboardSnapshot {
    pub fn marker_position(&self) -> Coordinate {
        self.train.position
    }

    /// linestring with the live position appended; empty without a linestring
    pub fn track_polyline(&self) -> Vec<Coordinate> {
        match &self.train.linestring {
            Some(points) => {
                let mut line = points.clone();
                line.push(self.train.position);
                line
            }
            None => Vec::new(),
        }
    }

    pub fn signal_category(&self) -> SignalCategory {
        self.signal.category
    }

    pub fn displayed_time(&self) -> String {
        if self.signal_health.data_unavailable {
            return "N/A".to_string();
        }
        format_time(self.signal.displayed_seconds, self.time_format)
    }

    pub fn gate_angle(&self) -> f64 {
        self.gate_angle
    }

    pub fn speed_label(&self) -> String {
        match self.train.speed {
            Some(mph) if !self.train_health.data_unavailable => format!("{:.1} mph", mph),
            _ => "N/A".to_string(),
        }
    }
}

/// "29.7" or "00:00:30"; the clock form rounds up so 0.1s still shows 00:00:01
pub fn format_time(seconds: f64, format: TimeFormat) -> String {
    let seconds = seconds.max(0.0);
    match format {
        TimeFormat::Seconds => format!("{:.1}", seconds),
        TimeFormat::Clock => {
            let total = seconds.ceil() as u64;
            format!("{:02}:{:02}:{:02}", total / 3600, (total / 60) % 60, total % 60)
        }
    }
}
