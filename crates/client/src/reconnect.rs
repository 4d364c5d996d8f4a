//! Reconnect policy: fixed wait plus optional jitter, unbounded attempts.

use std::time::Duration;

use sw_domain::config::ReconnectConfig;

/// Controls whether and how the session reconnects after an unexpected drop.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    pub enabled: bool,
    /// Delay before every attempt.
    pub wait: Duration,
    /// Upper bound of the extra delay added on top of `wait`.
    pub jitter: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            wait: Duration::from_secs(5),
            jitter: Duration::ZERO,
        }
    }
}

impl From<&ReconnectConfig> for ReconnectPolicy {
    fn from(config: &ReconnectConfig) -> Self {
        Self {
            enabled: config.enabled,
            wait: config.wait(),
            jitter: config.jitter(),
        }
    }
}

impl ReconnectPolicy {
    /// Enabled policy waiting `wait` between attempts.
    pub fn every(wait: Duration) -> Self {
        Self {
            enabled: true,
            wait,
            jitter: Duration::ZERO,
        }
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay before the given attempt (1-indexed).
    pub fn delay_for_attempt(&self, attempt: u64) -> Duration {
        if self.jitter.is_zero() {
            return self.wait;
        }
        self.wait + self.jitter.mul_f64(pseudo_random_fraction(attempt))
    }
}

/// Cheap deterministic "random" fraction in [0, 1] based on attempt number.
fn pseudo_random_fraction(attempt: u64) -> f64 {
    let hash = (attempt as u32).wrapping_mul(2654435761); // Knuth multiplicative hash
    (hash as f64) / (u32::MAX as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_is_disabled() {
        let p = ReconnectPolicy::default();
        assert!(!p.enabled);
        assert_eq!(p.wait, Duration::from_secs(5));
        assert!(p.jitter.is_zero());
    }

    #[test]
    fn delay_without_jitter_is_constant() {
        let p = ReconnectPolicy::every(Duration::from_millis(250));
        assert_eq!(p.delay_for_attempt(1), Duration::from_millis(250));
        assert_eq!(p.delay_for_attempt(1_000), Duration::from_millis(250));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let p = ReconnectPolicy::every(Duration::from_secs(1)).with_jitter(Duration::from_millis(500));
        for attempt in 1..200 {
            let d = p.delay_for_attempt(attempt);
            assert!(d >= Duration::from_secs(1));
            assert!(d <= Duration::from_millis(1_500));
        }
    }

    #[test]
    fn built_from_config() {
        let config = ReconnectConfig {
            enabled: true,
            wait_secs: 2,
            jitter_ms: 100,
        };
        let p = ReconnectPolicy::from(&config);
        assert!(p.enabled);
        assert_eq!(p.wait, Duration::from_secs(2));
        assert_eq!(p.jitter, Duration::from_millis(100));
    }
}
