//! Reconnect backoff policy
//!
//! Hub and agents never give up on a lost channel; the delay between
//! attempts is governed by this policy so liveness behavior is an
//! explicit, testable parameter instead of a hard-coded sleep.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Exponential backoff with a cap and unbounded attempts
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl RetryPolicy {
    /// Delay before retry attempt `attempt` (0-based)
    ///
    /// Total over degenerate inputs: a non-finite product falls back to
    /// `max_delay`, a negative one to zero.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt.min(32) as i32);
        let raw = self.initial_delay.as_secs_f64() * factor;
        if !raw.is_finite() {
            return self.max_delay;
        }
        Duration::from_secs_f64(raw.clamp(0.0, self.max_delay.as_secs_f64()))
    }

    /// A usable policy only ever grows delays, up to the cap
    pub fn is_valid(&self) -> bool {
        self.multiplier.is_finite()
            && self.multiplier >= 1.0
            && self.max_delay >= self.initial_delay
    }

    /// A flat policy: the same delay forever
    pub fn fixed(delay: Duration) -> Self {
        Self {
            initial_delay: delay,
            max_delay: delay,
            multiplier: 1.0,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
        }
    }
}
