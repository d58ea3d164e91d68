//! Per-request poll failures

use std::time::Duration;
use thiserror::Error;

/// Why a single query produced no record
///
/// None of these are fatal. A stale or out-of-order record is not an error at
/// all; see `reconciler::Applied::Stale`.
#[derive(Debug, Error)]
pub enum PollError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("endpoint returned status {0}")]
    Status(u16),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl PollError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        PollError::Malformed(reason.into())
    }

    /// transport-level failure as opposed to a bad payload
    pub fn is_network(&self) -> bool {
        matches!(self, PollError::Network(_) | PollError::Status(_) | PollError::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_network() {
        assert!(PollError::Status(503).is_network());
        assert!(PollError::Timeout(Duration::from_millis(50)).is_network());
        assert!(!PollError::malformed("no hits").is_network());
    }

    #[test]
    fn test_display() {
        assert_eq!(PollError::malformed("no hits").to_string(), "malformed response: no hits");
        assert_eq!(PollError::Status(404).to_string(), "endpoint returned status 404");
    }
}
