//! In-memory record sources for tests

use crate::domain::{Coordinate, PollRecord, SignalStatus, TimestampToken};
use crate::error::PollError;
use crate::source::RecordSource;

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::Notify;

pub fn signal_record(ts: &str, remaining: Option<f64>, sentence: Option<&str>) -> PollRecord {
    PollRecord {
        source_id: "signal".to_string(),
        position: Coordinate::new(38.43, -104.29),
        heading_linestring: None,
        speed: None,
        signal_status: SignalStatus::Green,
        remaining_seconds: remaining,
        status_sentence: sentence.map(str::to_string),
        timestamp: TimestampToken::from_text(ts),
    }
}

pub fn train_record(ts: &str, lat: f64, lon: f64) -> PollRecord {
    PollRecord {
        source_id: "BNSF-4410".to_string(),
        position: Coordinate::new(lat, lon),
        heading_linestring: Some(vec![Coordinate::new(lat - 0.01, lon - 0.01)]),
        speed: Some(35.0),
        signal_status: SignalStatus::Unknown,
        remaining_seconds: None,
        status_sentence: None,
        timestamp: TimestampToken::from_text(ts),
    }
}

/// plays back a script, then repeats `fallback` forever
pub struct ScriptedSource {
    script: Mutex<VecDeque<Result<PollRecord, PollError>>>,
    fallback: Option<PollRecord>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(script: Vec<Result<PollRecord, PollError>>, fallback: Option<PollRecord>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn repeating(record: PollRecord) -> Self {
        Self::new(Vec::new(), Some(record))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordSource for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn fetch(&self) -> Result<PollRecord, PollError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(result) => result,
            None => self
                .fallback
                .clone()
                .ok_or_else(|| PollError::malformed("script exhausted")),
        }
    }
}

/// holds every request in flight until released
pub struct GatedSource {
    record: PollRecord,
    gate: Notify,
    calls: AtomicUsize,
}

impl GatedSource {
    pub fn new(record: PollRecord) -> Self {
        Self {
            record,
            gate: Notify::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn release(&self) {
        self.gate.notify_waiters();
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordSource for GatedSource {
    fn name(&self) -> &str {
        "gated"
    }

    async fn fetch(&self) -> Result<PollRecord, PollError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.gate.notified().await;
        Ok(self.record.clone())
    }
}
