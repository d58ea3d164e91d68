//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `monitor.toml`.
//!     loads configuration from file or falls back to defaults.
//!
//! structure:
//!     - PollingConfig: cadence, request timeout, degraded-state threshold.
//!     - AnimationConfig: local tick period, gate timings, time format.
//!     - SearchConfig / FeedsConfig: where to query and which fields to read.
//!     - TrainConfig / SignalConfig: live feed or local simulation.
//!     - ServerConfig, LoggingConfig, crossings.
//!
//! ==============================================================================

use crate::domain::Coordinate;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MonitorConfig {
    pub polling: PollingConfig,
    pub animation: AnimationConfig,
    pub search: SearchConfig,
    pub feeds: FeedsConfig,
    pub train: TrainConfig,
    pub signal: SignalConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub crossings: Vec<Crossing>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            polling: PollingConfig::default(),
            animation: AnimationConfig::default(),
            search: SearchConfig::default(),
            feeds: FeedsConfig::default(),
            train: TrainConfig::default(),
            signal: SignalConfig::default(),
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            crossings: default_crossings(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_ms: u64,
    /// 0 disables the per-request timeout
    pub request_timeout_ms: u64,
    /// consecutive failures before the feed is reported unavailable
    pub unavailable_after: u32,
    pub max_in_flight: usize,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 100,
            request_timeout_ms: 2000,
            unavailable_after: 2,
            max_in_flight: 16,
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TimeFormat {
    /// "29.7"
    #[default]
    Seconds,
    /// "00:00:30"
    Clock,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AnimationConfig {
    pub tick_ms: u64,
    pub gate_close_seconds: f64,
    pub gate_open_seconds: f64,
    pub time_format: TimeFormat,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            tick_ms: 100,
            gate_close_seconds: 5.0,
            gate_open_seconds: 1.0,
            time_format: TimeFormat::Seconds,
        }
    }
}

impl AnimationConfig {
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SearchConfig {
    pub endpoint: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:9200".to_string(),
        }
    }
}

/// source field names for one feed; None means the feed does not carry it
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct FieldMap {
    pub id: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub speed: Option<String>,
    pub linestring: Option<String>,
    pub status: Option<String>,
    pub remaining: Option<String>,
    pub sentence: Option<String>,
    pub timestamp: String,
}

impl FieldMap {
    /// every configured field, timestamp included, in a stable order
    pub fn source_fields(&self) -> Vec<&str> {
        let optional = [
            &self.id,
            &self.latitude,
            &self.longitude,
            &self.speed,
            &self.linestring,
            &self.status,
            &self.remaining,
            &self.sentence,
        ];
        let mut fields: Vec<&str> = optional.iter().filter_map(|f| f.as_deref()).collect();
        fields.push(self.timestamp.as_str());
        fields
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct FeedConfig {
    pub name: String,
    /// index pattern, e.g. "cbs-train*"
    pub index: String,
    pub size: u32,
    /// relative range lower bound, e.g. "now-15m"
    pub lookback: String,
    pub fields: FieldMap,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FeedsConfig {
    pub train: FeedConfig,
    pub signal: FeedConfig,
}

impl Default for FeedsConfig {
    fn default() -> Self {
        Self {
            train: FeedConfig {
                name: "train".to_string(),
                index: "cbs-train*".to_string(),
                size: 10,
                lookback: "now-15m".to_string(),
                fields: FieldMap {
                    id: Some("train_id".to_string()),
                    latitude: Some("HOT_latitude".to_string()),
                    longitude: Some("HOT_longitude".to_string()),
                    speed: Some("HOT_speed_mph".to_string()),
                    linestring: Some("train_linestring".to_string()),
                    timestamp: "HOT_data_timestamp".to_string(),
                    ..FieldMap::default()
                },
            },
            signal: FeedConfig {
                name: "signal".to_string(),
                index: "cbs-signal*".to_string(),
                size: 1,
                lookback: "now-15m".to_string(),
                fields: FieldMap {
                    status: Some("light_status".to_string()),
                    remaining: Some("remaining_time".to_string()),
                    sentence: Some("sentence".to_string()),
                    timestamp: "prediction_timestamp".to_string(),
                    ..FieldMap::default()
                },
            },
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    #[default]
    Live,
    Simulated,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TrainConfig {
    pub mode: SourceMode,
    pub start: Coordinate,
    /// max random-walk step per axis in degrees (simulated mode)
    pub step_degrees: f64,
    /// how often the simulated train moves, independent of the poll cadence
    pub step_ms: u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            mode: SourceMode::Live,
            start: Coordinate::new(38.43222525534034, -104.29483988240153),
            step_degrees: 0.0025,
            step_ms: 2000,
        }
    }
}

impl TrainConfig {
    pub fn step_interval(&self) -> Duration {
        Duration::from_millis(self.step_ms.max(1))
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SignalConfig {
    pub mode: SourceMode,
    pub green_seconds: f64,
    pub red_seconds: f64,
    /// crossing whose location anchors signal records
    pub crossing_id: String,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            mode: SourceMode::Live,
            green_seconds: 30.0,
            red_seconds: 25.0,
            crossing_id: "85".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3000".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// log every accepted record at info
    pub show_records: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            show_records: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, serde::Serialize)]
pub struct Crossing {
    pub id: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

impl Crossing {
    pub fn position(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lon)
    }
}

fn default_crossings() -> Vec<Crossing> {
    vec![
        Crossing {
            id: "85".to_string(),
            name: "Railroad Crossing #85".to_string(),
            lat: 38.43222525534034,
            lon: -104.29483988240153,
        },
        Crossing {
            id: "86".to_string(),
            name: "Railroad Crossing #86".to_string(),
            lat: 38.422040,
            lon: -104.338302,
        },
    ]
}

impl MonitorConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;

        let config: MonitorConfig = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config: {}", e))?;

        Ok(config)
    }

    /// Load with default fallback
    pub fn load_or_default() -> Self {
        let paths = [
            std::path::PathBuf::from("config").join("monitor.toml"),
            std::path::PathBuf::from("..").join("config").join("monitor.toml"),
        ];

        for path in &paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(config) => {
                        println!("[CONFIG] Loaded from {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        println!("[CONFIG] Warning: Failed to load {}: {}", path.display(), e);
                    }
                }
            }
        }

        println!("[CONFIG] Warning: No config file found - using defaults");
        Self::default()
    }

    /// where signal records are drawn: the configured crossing, else the first one
    pub fn signal_anchor(&self) -> Coordinate {
        self.crossings
            .iter()
            .find(|c| c.id == self.signal.crossing_id)
            .or_else(|| self.crossings.first())
            .map(Crossing::position)
            .unwrap_or(self.train.start)
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        println!("┌─────────────────────────────────────────┐");
        println!("│          MONITOR CONFIGURATION          │");
        println!("├─────────────────────────────────────────┤");
        println!("│ Endpoint: {}", self.search.endpoint);
        println!("│ Train feed: {:?} ({})", self.train.mode, self.feeds.train.index);
        println!("│ Signal feed: {:?} ({})", self.signal.mode, self.feeds.signal.index);
        println!("│ Poll Interval: {}ms", self.polling.interval_ms);
        println!("│ Tick Period: {}ms", self.animation.tick_ms);
        println!("│ Crossings: {}", self.crossings.len());
        println!("│ Log Level: {}", self.logging.level);
        println!("└─────────────────────────────────────────┘");
    }
}
