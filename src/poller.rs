//! ==============================================================================
//! poller.rs - fixed-cadence query issuance per feed
//! ==============================================================================
//!
//! purpose:
//!     issues `source.fetch()` every interval without waiting for earlier
//!     requests, suppresses repeats of the last delivered timestamp, counts
//!     failures, and reports DataUnavailable after enough consecutive ones.
//!     polling never stops because of a data error; only stop() ends it.
//!
//! relationships:
//!     - uses: source.rs (RecordSource)
//!     - emits to: monitor.rs (FeedEvent over an mpsc channel)
//!
//! cancellation:
//!     stop() flips a flag and aborts the driver task. the driver owns the
//!     JoinSet of in-flight requests, so aborting it drops (and aborts) them
//!     too; a response that was already complete is discarded by the flag.
//!
//! ==============================================================================

use crate::domain::{PollRecord, TimestampToken};
use crate::error::PollError;
use crate::source::RecordSource;

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn, Level};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedId {
    Train,
    Signal,
}

impl std::fmt::Display for FeedId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedId::Train => write!(f, "train"),
            FeedId::Signal => write!(f, "signal"),
        }
    }
}

/// error counters for one feed, surfaced to the dashboard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FeedHealth {
    pub error_count: u64,
    pub consecutive_failures: u32,
    pub data_unavailable: bool,
}

#[derive(Debug)]
pub enum FeedEvent {
    Record { feed: FeedId, record: PollRecord },
    Health { feed: FeedId, health: FeedHealth },
}

// ==============================================================================
// tracker - the synchronous half
// ==============================================================================

#[derive(Debug)]
pub enum PollOutcome {
    Fresh(PollRecord),
    /// same timestamp as the last delivered record
    Duplicate,
    Failed(PollError),
}

pub struct PollTracker {
    last_token: Option<TimestampToken>,
    health: FeedHealth,
    unavailable_after: u32,
}

impl PollTracker {
    pub fn new(unavailable_after: u32) -> Self {
        Self {
            last_token: None,
            health: FeedHealth::default(),
            unavailable_after: unavailable_after.max(1),
        }
    }

    pub fn observe(&mut self, result: Result<PollRecord, PollError>) -> PollOutcome {
        match result {
            Ok(record) => {
                self.health.consecutive_failures = 0;
                self.health.data_unavailable = false;
                if self.last_token.as_ref() == Some(&record.timestamp) {
                    return PollOutcome::Duplicate;
                }
                self.last_token = Some(record.timestamp.clone());
                PollOutcome::Fresh(record)
            }
            Err(err) => {
                self.health.error_count += 1;
                self.health.consecutive_failures = self.health.consecutive_failures.saturating_add(1);
                if self.health.consecutive_failures >= self.unavailable_after {
                    self.health.data_unavailable = true;
                }
                PollOutcome::Failed(err)
            }
        }
    }

    pub fn health(&self) -> FeedHealth {
        self.health
    }
}

// ==============================================================================
// driver - the timer task
// ==============================================================================

#[derive(Debug, Clone)]
pub struct PollerSettings {
    pub interval: Duration,
    pub unavailable_after: u32,
    pub max_in_flight: usize,
    pub show_records: bool,
}

pub struct Poller {
    feed: FeedId,
    stopped: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl Poller {
    /// begin polling; the first request goes out immediately
    pub fn start(
        feed: FeedId,
        source: Arc<dyn RecordSource>,
        settings: PollerSettings,
        events: mpsc::Sender<FeedEvent>,
    ) -> Self {
        info!(
            "[POLL] {} feed via {} every {:?}",
            feed,
            source.name(),
            settings.interval
        );
        let stopped = Arc::new(AtomicBool::new(false));
        let task = tokio::spawn(run(feed, source, settings, events, stopped.clone()));
        Self { feed, stopped, task }
    }

    /// cancel future ticks and make any in-flight response inert
    pub fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            debug!("[POLL] {} feed stopped", self.feed);
        }
        self.task.abort();
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn feed(&self) -> FeedId {
        self.feed
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}

/// network errors always warn; a malformed body warns once per failure streak
fn failure_level(err: &PollError, consecutive_failures: u32) -> Level {
    if err.is_network() || consecutive_failures <= 1 {
        Level::WARN
    } else {
        Level::DEBUG
    }
}

async fn run(
    feed: FeedId,
    source: Arc<dyn RecordSource>,
    settings: PollerSettings,
    events: mpsc::Sender<FeedEvent>,
    stopped: Arc<AtomicBool>,
) {
    let mut ticker = tokio::time::interval(settings.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut in_flight: JoinSet<Result<PollRecord, PollError>> = JoinSet::new();
    let mut tracker = PollTracker::new(settings.unavailable_after);
    let max_in_flight = settings.max_in_flight.max(1);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if stopped.load(Ordering::SeqCst) {
                    break;
                }
                if in_flight.len() >= max_in_flight {
                    debug!("[POLL] {} skipping tick, {} requests outstanding", feed, in_flight.len());
                    continue;
                }
                let source = source.clone();
                in_flight.spawn(async move { source.fetch().await });
            }
            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                if stopped.load(Ordering::SeqCst) {
                    break;
                }
                let result = match joined {
                    Ok(result) => result,
                    Err(e) => {
                        warn!("[POLL] {} request task failed: {}", feed, e);
                        continue;
                    }
                };

                let before = tracker.health();
                let outcome = tracker.observe(result);
                let after = tracker.health();

                let record = match outcome {
                    PollOutcome::Fresh(record) => {
                        if settings.show_records {
                            info!("[POLL] {} record {} @ {}", feed, record.source_id, record.timestamp.as_str());
                        }
                        Some(record)
                    }
                    PollOutcome::Duplicate => None,
                    PollOutcome::Failed(err) => {
                        if failure_level(&err, after.consecutive_failures) == Level::WARN {
                            warn!("[POLL] {} request failed ({} errors so far): {}", feed, after.error_count, err);
                        } else {
                            debug!("[POLL] {} request failed ({} errors so far): {}", feed, after.error_count, err);
                        }
                        None
                    }
                };

                if after.data_unavailable && !before.data_unavailable {
                    warn!("[POLL] {} data unavailable after {} consecutive failures", feed, after.consecutive_failures);
                } else if before.data_unavailable && !after.data_unavailable {
                    info!("[POLL] {} data available again", feed);
                }

                if after != before && events.send(FeedEvent::Health { feed, health: after }).await.is_err() {
                    break;
                }
                if let Some(record) = record {
                    if events.send(FeedEvent::Record { feed, record }).await.is_err() {
                        break;
                    }
                }
            }
        }
    }
    debug!("[POLL] {} driver exiting, dropping {} in-flight requests", feed, in_flight.len());
}
