//! Configuration types for the request tap.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TapConfig {
    /// Maximum number of recent URLs kept per page for diagnostics.
    pub recent_urls: usize,
}

impl Default for TapConfig {
    fn default() -> Self {
        Self { recent_urls: 32 }
    }
}
