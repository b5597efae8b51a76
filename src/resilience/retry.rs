//! Reconnect pacing for the store.

use std::time::Duration;

use rand::Rng;

use crate::config::DatabaseSettings;

/// Doubling delays between store reconnect attempts, never above `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base: Duration,
    pub max: Duration,
}

impl From<&DatabaseSettings> for RetryPolicy {
    fn from(settings: &DatabaseSettings) -> Self {
        Self {
            base: Duration::from_millis(settings.retry_base_delay_ms),
            max: Duration::from_millis(settings.retry_max_delay_ms),
        }
    }
}

impl RetryPolicy {
    /// Un-jittered delay before reconnect `attempt` (1-based).
    pub fn ceiling(&self, attempt: u32) -> Duration {
        let doublings = attempt.saturating_sub(1).min(31);
        self.base
            .checked_mul(1u32 << doublings)
            .map_or(self.max, |delay| delay.min(self.max))
    }

    /// The ceiling minus up to a tenth, so gateways restarted together spread out.
    pub fn delay(&self, attempt: u32) -> Duration {
        let ceiling = self.ceiling(attempt);
        let spread = ceiling / 10;
        if spread.is_zero() {
            return ceiling;
        }
        ceiling.saturating_sub(spread.mul_f64(rand::thread_rng().gen::<f64>()))
    }
}
