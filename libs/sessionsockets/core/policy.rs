//! Reconnection policy
//!
//! Counts consecutive failures since the last successful handshake and asks
//! the configured [`ReconnectionStrategy`] for the next backoff delay.

use crate::traits::{ExponentialBackoff, ReconnectionStrategy};
use std::time::Duration;

/// A retry the manager should schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPlan {
    /// 1-based attempt number after incrementing the counter
    pub attempt: u32,
    pub delay: Duration,
}

pub struct ReconnectionPolicy {
    strategy: Box<dyn ReconnectionStrategy>,
    attempts: u32,
}

impl ReconnectionPolicy {
    pub fn new(strategy: Box<dyn ReconnectionStrategy>) -> Self {
        Self {
            strategy,
            attempts: 0,
        }
    }

    /// Record an unintentional closure.
    ///
    /// Returns the retry to schedule, or `None` once the strategy refuses
    /// further attempts. The counter is only incremented when a retry is
    /// planned, so with `counter < max` the delay is
    /// `base * 2^(counter - 1)` after the increment.
    pub fn on_failure(&mut self) -> Option<RetryPlan> {
        if !self.strategy.should_reconnect(self.attempts) {
            return None;
        }

        let delay = self.strategy.next_delay(self.attempts)?;
        self.attempts += 1;
        Some(RetryPlan {
            attempt: self.attempts,
            delay,
        })
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> Option<u32> {
        self.strategy.max_attempts()
    }
}

impl Default for ReconnectionPolicy {
    fn default() -> Self {
        Self::new(Box::new(ExponentialBackoff::default()))
    }
}

impl std::fmt::Debug for ReconnectionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconnectionPolicy")
            .field("attempts", &self.attempts)
            .field("max_attempts", &self.max_attempts())
            .finish()
    }
}
