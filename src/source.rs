//! ==============================================================================
//! source.rs - record sources (the query capability)
//! ==============================================================================
//!
//! purpose:
//!     provides a single interface for "get me the newest record" so the
//!     poller does not care whether the answer comes from the search index
//!     or from a local simulation.
//!
//! implementations:
//!     - SearchSource: POSTs the feed's query to `{endpoint}/{index}/_search`.
//!     - SimulatedTrainSource: random-walk train for running without an index.
//!
//! relationships:
//!     - used by: poller.rs (each tick calls fetch on a spawned task)
//!     - uses: feed.rs (search_body, decode_response)
//!
//! ==============================================================================

use crate::config::FeedConfig;
use crate::domain::{Coordinate, PollRecord, SignalStatus, TimestampToken};
use crate::error::PollError;
use crate::feed;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

#[async_trait]
pub trait RecordSource: Send + Sync {
    /// short label used in logs
    fn name(&self) -> &str;

    /// fetch the newest record; every call is independent
    async fn fetch(&self) -> std::result::Result<PollRecord, PollError>;
}

// ==============================================================================
// search index source
// ==============================================================================

pub struct SearchSource {
    client: reqwest::Client,
    url: String,
    feed: FeedConfig,
    anchor: Coordinate,
    timeout: Option<Duration>,
}

impl SearchSource {
    pub fn new(endpoint: &str, feed: FeedConfig, anchor: Coordinate, timeout: Option<Duration>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("failed to build http client")?;
        let url = format!("{}/{}/_search", endpoint.trim_end_matches('/'), feed.index);
        Ok(Self {
            client,
            url,
            feed,
            anchor,
            timeout,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl RecordSource for SearchSource {
    fn name(&self) -> &str {
        &self.feed.name
    }

    async fn fetch(&self) -> std::result::Result<PollRecord, PollError> {
        let mut request = self.client.post(&self.url).json(&feed::search_body(&self.feed));
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PollError::Status(status.as_u16()));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| if e.is_timeout() { self.classify(e) } else { PollError::malformed(e.to_string()) })?;

        feed::decode_response(&body, &self.feed, self.anchor)
    }
}

impl SearchSource {
    fn classify(&self, e: reqwest::Error) -> PollError {
        match self.timeout {
            Some(timeout) if e.is_timeout() => PollError::Timeout(timeout),
            _ => PollError::Network(e),
        }
    }
}

// ==============================================================================
// simulated train
// ==============================================================================
// wanders around its start point so the map has something to draw when no
// index is configured. it moves at most once per step interval; fetches in
// between repeat the last record, which the poller drops as a duplicate.

struct Walk {
    position: Coordinate,
    last_step: Instant,
    timestamp: TimestampToken,
}

pub struct SimulatedTrainSource {
    walk: Mutex<Walk>,
    step_degrees: f64,
    step_interval: Duration,
    started: Instant,
    started_at: DateTime<Utc>,
}

impl SimulatedTrainSource {
    pub fn new(start: Coordinate, step_degrees: f64, step_interval: Duration) -> Self {
        let started = Instant::now();
        let started_at = Utc::now();
        Self {
            walk: Mutex::new(Walk {
                position: start,
                last_step: started,
                timestamp: TimestampToken::from_instant(started_at),
            }),
            step_degrees: step_degrees.abs(),
            step_interval,
            started,
            started_at,
        }
    }

    /// wall-clock time advanced by the runtime clock, so paused tests stay deterministic
    fn stamp(&self, now: Instant) -> TimestampToken {
        let elapsed = chrono::Duration::from_std(now - self.started).unwrap_or_else(|_| chrono::Duration::zero());
        TimestampToken::from_instant(self.started_at + elapsed)
    }
}

#[async_trait]
impl RecordSource for SimulatedTrainSource {
    fn name(&self) -> &str {
        "train-sim"
    }

    async fn fetch(&self) -> std::result::Result<PollRecord, PollError> {
        let (position, timestamp) = {
            let now = Instant::now();
            let mut walk = self
                .walk
                .lock()
                .map_err(|_| PollError::malformed("simulated position lock poisoned"))?;
            if now - walk.last_step >= self.step_interval {
                let mut rng = rand::rng();
                walk.position.lat += rng.random_range(-1.0..=1.0) * self.step_degrees;
                walk.position.lon += rng.random_range(-1.0..=1.0) * self.step_degrees;
                walk.last_step = now;
                walk.timestamp = self.stamp(now);
            }
            (walk.position, walk.timestamp.clone())
        };

        Ok(PollRecord {
            source_id: "vehicle-1".to_string(),
            position,
            heading_linestring: None,
            speed: None,
            signal_status: SignalStatus::Unknown,
            remaining_seconds: None,
            status_sentence: None,
            timestamp,
        })
    }
}
