use std::time::Duration;

/// Backoff curve used after unintentional closures
///
/// Strategies are stateless: the consecutive-failure counter lives in
/// [`ReconnectionPolicy`](crate::core::policy::ReconnectionPolicy), which
/// passes it in as `attempt`.
pub trait ReconnectionStrategy: Send + Sync {
    /// Delay before retry number `attempt` (0-indexed), or `None` to give up
    fn next_delay(&self, attempt: u32) -> Option<Duration>;

    /// Upper bound on consecutive attempts, if any
    fn max_attempts(&self) -> Option<u32>;

    fn should_reconnect(&self, attempt: u32) -> bool {
        self.max_attempts().map_or(true, |max| attempt < max)
    }
}

/// `base_delay * 2^attempt`, capped at `max_delay`
///
/// The product saturates, so huge attempt numbers clamp to `max_delay`
/// instead of overflowing.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    base_delay: Duration,
    max_delay: Duration,
    max_attempts: Option<u32>,
}

impl ExponentialBackoff {
    /// `max_attempts: None` retries forever
    pub fn new(base_delay: Duration, max_delay: Duration, max_attempts: Option<u32>) -> Self {
        Self {
            base_delay,
            max_delay,
            max_attempts,
        }
    }
}

impl Default for ExponentialBackoff {
    /// 1s doubling to a 30s cap, five attempts
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(30), Some(5))
    }
}

impl ReconnectionStrategy for ExponentialBackoff {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if !self.should_reconnect(attempt) {
            return None;
        }

        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        let delay = self.base_delay.saturating_mul(factor);
        Some(delay.min(self.max_delay))
    }

    fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }
}

/// Same delay before every attempt
#[derive(Debug, Clone)]
pub struct FixedDelay {
    delay: Duration,
    max_attempts: Option<u32>,
}

impl FixedDelay {
    pub fn new(delay: Duration, max_attempts: Option<u32>) -> Self {
        Self { delay, max_attempts }
    }
}

impl ReconnectionStrategy for FixedDelay {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        self.should_reconnect(attempt).then_some(self.delay)
    }

    fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }
}

/// Every unintentional closure goes straight to the error state
#[derive(Debug, Clone)]
pub struct NeverReconnect;

impl ReconnectionStrategy for NeverReconnect {
    fn next_delay(&self, _attempt: u32) -> Option<Duration> {
        None
    }

    fn max_attempts(&self) -> Option<u32> {
        Some(0)
    }
}
