//! Caller-side reconnect policy for the server event stream.
//!
//! The subscription itself never reconnects. [`crate::SessionSync`] consults this
//! policy after each stream failure.

use std::time::Duration;

use opencode_api::retry::{backoff_delay, BASE_DELAY_MS, MAX_DELAY_MS};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Consecutive failed attempts tolerated before giving up.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(BASE_DELAY_MS),
            max_delay: Duration::from_millis(MAX_DELAY_MS),
        }
    }
}

impl ReconnectPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    pub fn with_delays(mut self, base_delay: Duration, max_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self.max_delay = max_delay;
        self
    }

    /// Delay before reconnect attempt `attempt` (zero-based), or `None` once the
    /// limit is reached.
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        Some(backoff_delay(attempt, self.base_delay, self.max_delay))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::ReconnectPolicy;

    #[test]
    fn delays_grow_exponentially_until_capped() {
        let policy = ReconnectPolicy::new(8);
        let delays = (0..6)
            .map(|attempt| policy.delay(attempt).expect("within limit").as_millis())
            .collect::<Vec<_>>();
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 16000, 30000]);
    }

    #[test]
    fn policy_stops_after_max_attempts() {
        let policy = ReconnectPolicy::new(2)
            .with_delays(Duration::from_millis(5), Duration::from_millis(50));
        assert_eq!(policy.delay(0), Some(Duration::from_millis(5)));
        assert_eq!(policy.delay(1), Some(Duration::from_millis(10)));
        assert_eq!(policy.delay(2), None);
        assert_eq!(ReconnectPolicy::new(0).delay(0), None);
    }

    #[test]
    fn huge_attempts_do_not_overflow() {
        let policy = ReconnectPolicy::new(u32::MAX);
        assert_eq!(policy.delay(u32::MAX - 1), Some(Duration::from_secs(30)));
    }
}
