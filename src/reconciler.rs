//! ==============================================================================
//! reconciler.rs - applies poll records to owned state
//! ==============================================================================
//!
//! purpose:
//!     keeps `latest` monotonic in timestamp no matter what order responses
//!     complete in, and re-seeds the countdown when a record carries one.
//!     also maps light status + sentence to the dashboard category.
//!
//! relationships:
//!     - fed by: monitor.rs (FeedEvent::Record from the pollers)
//!     - ticked by: animator.rs (Animator::advance on state_mut)
//!
//! ==============================================================================

use crate::domain::{PollRecord, ReconciledState, SignalCategory, SignalStatus};
use tracing::debug;

/// result of offering a record to the reconciler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Accepted,
    /// equal or older than what we hold; expected under concurrent polling
    Stale,
}

pub struct Reconciler {
    state: ReconciledState,
}

impl Reconciler {
    pub fn new(sentinel: PollRecord) -> Self {
        Self {
            state: ReconciledState::new(sentinel),
        }
    }

    /// accept `record` only if strictly newer than the held one
    pub fn on_poll_record(&mut self, record: PollRecord) -> Applied {
        if record.timestamp <= self.state.latest.timestamp {
            debug!(
                "[RECONCILE] {} dropped stale record {} (holding {})",
                record.source_id,
                record.timestamp.as_str(),
                self.state.latest.timestamp.as_str()
            );
            return Applied::Stale;
        }

        if let Some(seconds) = record.remaining_seconds {
            // f64::max also folds NaN to 0
            self.state.displayed_seconds = seconds.max(0.0);
            self.state.is_counting = self.state.displayed_seconds > 0.0;
        }
        self.state.latest = record;
        Applied::Accepted
    }

    pub fn state(&self) -> &ReconciledState {
        &self.state
    }

    pub(crate) fn state_mut(&mut self) -> &mut ReconciledState {
        &mut self.state
    }

    pub fn category(&self) -> SignalCategory {
        let latest = &self.state.latest;
        derive_category(latest.signal_status, latest.status_sentence.as_deref())
    }
}

const SENTENCE_CLEAR: &str = "crossing is clear";
const SENTENCE_APPROACHING: &str = "train is approaching";
const SENTENCE_OCCUPIED: &str = "train present at crossing";

/// map a record's status to a dashboard category
///
/// The sentence wins when present: exact, case-insensitive match against the
/// fixed vocabulary, anything else is Unknown. Without a sentence the light
/// colour decides.
pub fn derive_category(status: SignalStatus, sentence: Option<&str>) -> SignalCategory {
    match sentence {
        Some(text) => {
            let text = text.trim();
            if text.eq_ignore_ascii_case(SENTENCE_CLEAR) {
                SignalCategory::Clear
            } else if text.eq_ignore_ascii_case(SENTENCE_APPROACHING) {
                SignalCategory::Approaching
            } else if text.eq_ignore_ascii_case(SENTENCE_OCCUPIED) {
                SignalCategory::Occupied
            } else {
                SignalCategory::Unknown
            }
        }
        None => match status {
            SignalStatus::Green => SignalCategory::Clear,
            SignalStatus::Yellow => SignalCategory::Approaching,
            SignalStatus::Red => SignalCategory::Occupied,
            SignalStatus::Unknown => SignalCategory::Unknown,
        },
    }
}
