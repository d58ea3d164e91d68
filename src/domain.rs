//! ==============================================================================
//! domain.rs - records and derived state shared by every component
//! ==============================================================================
//!
//! purpose:
//!     defines what a poll produces (PollRecord), how freshness is compared
//!     (TimestampToken), and the state the reconciler owns (ReconciledState).
//!
//! relationships:
//!     - produced by: feed.rs (decode_response), source.rs (simulated train)
//!     - owned by: reconciler.rs (ReconciledState)
//!     - read by: presenter.rs (snapshot panels)
//!
//! ==============================================================================

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::cmp::Ordering;

/// a (lat, lon) pair in decimal degrees
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// light colour reported by the crossing-signal feed
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalStatus {
    Red,
    Green,
    Yellow,
    #[default]
    Unknown,
}

impl SignalStatus {
    /// lenient parse: anything outside the known colours is Unknown
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "red" => SignalStatus::Red,
            "green" => SignalStatus::Green,
            "yellow" | "amber" => SignalStatus::Yellow,
            _ => SignalStatus::Unknown,
        }
    }
}

/// what the dashboard shows for the crossing
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalCategory {
    Clear,
    Approaching,
    Occupied,
    #[default]
    Unknown,
}

// ==============================================================================
// timestamp token
// ==============================================================================
// the feeds hand us timestamps as strings (sometimes with offsets, sometimes
// naive) or as epoch millis. we keep the raw text for display and the parsed
// instant for ordering; two spellings of one instant are the same token.

/// opaque, totally ordered freshness token
#[derive(Clone, Debug)]
pub struct TimestampToken {
    raw: String,
    instant: Option<DateTime<Utc>>,
}

impl TimestampToken {
    /// parse RFC 3339 first, then naive ISO-8601 read as UTC
    pub fn from_text(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let trimmed = raw.trim();
        let instant = DateTime::parse_from_rfc3339(trimmed)
            .map(|t| t.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
                    .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f"))
                    .map(|n| n.and_utc())
                    .ok()
            });
        Self { raw, instant }
    }

    pub fn from_epoch_millis(ms: i64) -> Self {
        Self {
            raw: ms.to_string(),
            instant: DateTime::from_timestamp_millis(ms),
        }
    }

    pub fn from_instant(instant: DateTime<Utc>) -> Self {
        Self {
            raw: instant.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            instant: Some(instant),
        }
    }

    /// the token every real timestamp is newer than
    pub fn origin() -> Self {
        Self {
            raw: String::new(),
            instant: None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn instant(&self) -> Option<DateTime<Utc>> {
        self.instant
    }
}

impl Ord for TimestampToken {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.instant, other.instant) {
            (Some(a), Some(b)) => a.cmp(&b),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (None, None) => self.raw.cmp(&other.raw),
        }
    }
}

impl PartialOrd for TimestampToken {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for TimestampToken {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for TimestampToken {}

impl Serialize for TimestampToken {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

// ==============================================================================
// poll record
// ==============================================================================

/// one decoded row from a feed; immutable once built
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PollRecord {
    /// train id, or the feed name when the row carries none
    pub source_id: String,
    pub position: Coordinate,
    pub heading_linestring: Option<Vec<Coordinate>>,
    /// mph
    pub speed: Option<f64>,
    pub signal_status: SignalStatus,
    pub remaining_seconds: Option<f64>,
    pub status_sentence: Option<String>,
    pub timestamp: TimestampToken,
}

impl PollRecord {
    /// placeholder held from mount until the first accepted record
    pub fn sentinel(position: Coordinate) -> Self {
        Self {
            source_id: "unknown".to_string(),
            position,
            heading_linestring: None,
            speed: None,
            signal_status: SignalStatus::Unknown,
            remaining_seconds: Some(0.0),
            status_sentence: None,
            timestamp: TimestampToken::origin(),
        }
    }
}

/// state owned by a reconciler; the animator only touches displayed_seconds
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReconciledState {
    pub latest: PollRecord,
    /// never negative
    pub displayed_seconds: f64,
    pub is_counting: bool,
}

impl ReconciledState {
    pub fn new(sentinel: PollRecord) -> Self {
        let displayed_seconds = sentinel.remaining_seconds.unwrap_or(0.0).max(0.0);
        Self {
            latest: sentinel,
            displayed_seconds,
            is_counting: displayed_seconds > 0.0,
        }
    }
}
