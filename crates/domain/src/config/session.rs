use std::time::Duration;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Seconds to wait for a reply before the transport synthesizes a
    /// timeout.  `0` disables the per-call timer.
    #[serde(default = "d_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Interval between `sp/echo` keepalives while the session is ready.
    #[serde(default = "d_keepalive_interval_secs")]
    pub keepalive_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: d_request_timeout_secs(),
            keepalive_interval_secs: d_keepalive_interval_secs(),
        }
    }
}

impl SessionConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_interval_secs)
    }
}

fn d_request_timeout_secs() -> u64 {
    10
}

fn d_keepalive_interval_secs() -> u64 {
    180
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_timeout_disables_timer() {
        let cfg = SessionConfig {
            request_timeout_secs: 0,
            ..Default::default()
        };
        assert_eq!(cfg.request_timeout(), None);
    }
}
