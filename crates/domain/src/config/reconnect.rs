use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Automatic reconnection after an unexpected disconnect.
///
/// Attempts are unbounded: once enabled, the client keeps retrying until it
/// connects or is closed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Fixed wait before each attempt.
    #[serde(default = "d_wait_secs")]
    pub wait_secs: u64,
    /// Upper bound of the spread added on top of `wait_secs`.
    #[serde(default)]
    pub jitter_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            wait_secs: d_wait_secs(),
            jitter_ms: 0,
        }
    }
}

impl ReconnectConfig {
    pub fn wait(&self) -> Duration {
        Duration::from_secs(self.wait_secs)
    }

    pub fn jitter(&self) -> Duration {
        Duration::from_millis(self.jitter_ms)
    }
}

fn d_wait_secs() -> u64 {
    5
}
