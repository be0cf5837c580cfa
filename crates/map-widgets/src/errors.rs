use sync_engine::{PortError, SyncError};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum WidgetError {
    /// A controller or wait in the engine failed
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// The widget reached a stable state, but not the one the page is supposed to show
    #[error("{widget}: expected {expected}, observed {observed}")]
    Expectation {
        widget: String,
        expected: String,
        observed: String,
    },
}

impl From<PortError> for WidgetError {
    fn from(err: PortError) -> Self {
        WidgetError::Sync(SyncError::Port(err))
    }
}

impl WidgetError {
    pub(crate) fn expectation(
        widget: &str,
        expected: impl Into<String>,
        observed: impl Into<String>,
    ) -> Self {
        WidgetError::Expectation {
            widget: widget.to_string(),
            expected: expected.into(),
            observed: observed.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            WidgetError::Sync(err) => err.kind(),
            WidgetError::Expectation { .. } => "expectation",
        }
    }
}
