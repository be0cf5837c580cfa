//! Timing policy shared by every controller.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Bounded waits used by the controllers. All values are milliseconds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncPolicy {
    /// Interval between condition polls
    pub poll_interval_ms: u64,
    /// Budget for a disclosure's sentinel to appear after the trigger click
    pub disclosure_open_ms: u64,
    /// Budget for a previous disclosure to disappear after dismissal
    pub disclosure_close_ms: u64,
    /// Budget for a disclosure's readiness condition
    pub disclosure_ready_ms: u64,
    /// Budget for a toggle to show the requested state
    pub toggle_confirm_ms: u64,
    /// Budget for a selection widget to reflect a change
    pub selection_confirm_ms: u64,
    /// Budget for generic visibility/text conditions
    pub condition_ms: u64,
    /// Overall quiescence budget
    pub load_timeout_ms: u64,
    /// Longest silence tolerated between tracked requests
    pub per_request_timeout_ms: u64,
    /// Pause after each observed request
    pub settle_ms: u64,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            disclosure_open_ms: 5_000,
            disclosure_close_ms: 5_000,
            disclosure_ready_ms: 30_000,
            toggle_confirm_ms: 5_000,
            selection_confirm_ms: 10_000,
            condition_ms: 10_000,
            load_timeout_ms: 30_000,
            per_request_timeout_ms: 10_000,
            settle_ms: 500,
        }
    }
}

impl SyncPolicy {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn condition_budget(&self) -> Duration {
        Duration::from_millis(self.condition_ms)
    }

    /// Quiescence options derived from this policy.
    pub fn quiescence(&self) -> QuiescenceOptions {
        QuiescenceOptions {
            load_timeout: Duration::from_millis(self.load_timeout_ms),
            per_request_timeout: Duration::from_millis(self.per_request_timeout_ms),
            settle: Duration::from_millis(self.settle_ms),
        }
    }
}

/// Per-call quiescence parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QuiescenceOptions {
    pub load_timeout: Duration,
    pub per_request_timeout: Duration,
    pub settle: Duration,
}

impl Default for QuiescenceOptions {
    fn default() -> Self {
        SyncPolicy::default().quiescence()
    }
}

impl QuiescenceOptions {
    pub fn with_load_timeout(mut self, value: Duration) -> Self {
        self.load_timeout = value;
        self
    }

    pub fn with_per_request_timeout(mut self, value: Duration) -> Self {
        self.per_request_timeout = value;
        self
    }

    pub fn with_settle(mut self, value: Duration) -> Self {
        self.settle = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let options = QuiescenceOptions::default();
        assert_eq!(options.load_timeout, Duration::from_secs(30));
        assert_eq!(options.per_request_timeout, Duration::from_secs(10));
        assert_eq!(options.settle, Duration::from_millis(500));
    }

    #[test]
    fn partial_policy_fills_defaults() {
        let policy: SyncPolicy = serde_json::from_str(r#"{"settle_ms": 250}"#).unwrap();
        assert_eq!(policy.settle_ms, 250);
        assert_eq!(policy.poll_interval_ms, 100);
        assert_eq!(policy.quiescence().settle, Duration::from_millis(250));
    }
}
