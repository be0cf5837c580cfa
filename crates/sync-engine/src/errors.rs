//! Error types for the synchronization engine

use std::fmt;

use thiserror::Error;

/// Failure reported by the host runtime behind an [`InterfaceHandle`](crate::InterfaceHandle).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PortError {
    /// No element matched the descriptor
    #[error("element not found: {0}")]
    ElementNotFound(String),

    /// Descriptor rejected before reaching the page
    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(String),

    /// Request stream could not be attached
    #[error("request tap unavailable: {0}")]
    Tap(String),

    /// Transport or protocol failure in the host runtime
    #[error("host i/o error: {0}")]
    Io(String),
}

/// Two-state view of a disclosure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisclosureState {
    Open,
    Closed,
}

impl fmt::Display for DisclosureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisclosureState::Open => f.write_str("open"),
            DisclosureState::Closed => f.write_str("closed"),
        }
    }
}

/// State of a binary control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToggleState {
    On,
    Off,
}

impl ToggleState {
    pub fn from_flag(on: bool) -> Self {
        if on {
            ToggleState::On
        } else {
            ToggleState::Off
        }
    }

    pub fn is_on(&self) -> bool {
        matches!(self, ToggleState::On)
    }
}

impl fmt::Display for ToggleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToggleState::On => f.write_str("on"),
            ToggleState::Off => f.write_str("off"),
        }
    }
}

/// Every way a synchronization operation can fail. Each variant carries the last state that
/// was observed so the failure can be diagnosed without re-running the scenario.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SyncError {
    /// The tracked resource made zero matching requests
    #[error("no request matching '{pattern}' started within {waited_ms}ms")]
    NeverStarted { pattern: String, waited_ms: u64 },

    /// Matching requests kept arriving past the overall budget
    #[error("requests matching '{pattern}' still arriving after {budget_ms}ms ({requests} observed)")]
    TimedOut {
        pattern: String,
        requests: u64,
        budget_ms: u64,
    },

    /// Disclosure did not reach the open state
    #[error("disclosure '{disclosure}' failed ({last_observed}): {reason}")]
    Disclosure {
        disclosure: String,
        last_observed: DisclosureState,
        reason: String,
    },

    /// Toggle did not reach the requested state
    #[error("toggle '{toggle}' expected {expected}, observed {observed}")]
    Toggle {
        toggle: String,
        expected: ToggleState,
        observed: ToggleState,
    },

    /// Selection widget did not converge
    #[error("selection '{widget}' did not converge to {expected} (control disabled: {disabled}, caption: {caption:?})")]
    Selection {
        widget: String,
        expected: u64,
        disabled: bool,
        caption: Option<String>,
    },

    /// Displayed text could not be read as a number
    #[error("expected a number in {locator}, found {text:?}")]
    NotNumeric { locator: String, text: Option<String> },

    /// Numeric readback did not match the expected value
    #[error("{what} expected {expected}, observed {observed:?}")]
    UnexpectedReadback {
        what: String,
        expected: String,
        observed: Option<String>,
    },

    /// Generic bounded wait expired
    #[error("condition '{condition}' not met within {waited_ms}ms (last observed: {last_observed})")]
    ConditionTimeout {
        condition: String,
        waited_ms: u64,
        last_observed: String,
    },

    /// Controller descriptor is missing a required part
    #[error("misconfigured widget: {0}")]
    Misconfigured(String),

    /// Host runtime failure
    #[error(transparent)]
    Port(#[from] PortError),
}

impl SyncError {
    /// Stable label used for metrics and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::NeverStarted { .. } => "never_started",
            SyncError::TimedOut { .. } => "timed_out",
            SyncError::Disclosure { .. } => "disclosure",
            SyncError::Toggle { .. } => "toggle",
            SyncError::Selection { .. } => "selection",
            SyncError::NotNumeric { .. } => "not_numeric",
            SyncError::UnexpectedReadback { .. } => "unexpected_readback",
            SyncError::ConditionTimeout { .. } => "condition_timeout",
            SyncError::Misconfigured(_) => "misconfigured",
            SyncError::Port(_) => "port",
        }
    }

    /// Wiring/selector defect rather than a slow backend.
    pub fn is_configuration_defect(&self) -> bool {
        matches!(
            self,
            SyncError::NeverStarted { .. }
                | SyncError::Misconfigured(_)
                | SyncError::Port(PortError::InvalidDescriptor(_))
        )
    }
}
