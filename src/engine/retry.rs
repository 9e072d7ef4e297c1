//! Timing of the bounded live poll.

use std::time::Duration;

use crate::config::RetryConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub fast_attempts: u32,
    pub fast_delay: Duration,
    pub slow_delay: Duration,
    /// `None` falls back to the midpoint of `max_attempts`.
    pub interim_attempt: Option<u32>,
    pub interim_text: String,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            fast_attempts: config.fast_attempts,
            fast_delay: Duration::from_millis(config.fast_delay_ms),
            slow_delay: Duration::from_millis(config.slow_delay_ms),
            interim_attempt: config.interim_attempt,
            interim_text: config.interim_text.clone(),
        }
    }
}

impl RetryPolicy {
    /// Wait before checking the queue on `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt <= self.fast_attempts {
            self.fast_delay
        } else {
            self.slow_delay
        }
    }

    /// The attempt after which the placeholder goes up, if any.
    pub fn interim_at(&self) -> Option<u32> {
        match self.interim_attempt {
            Some(at) => Some(at),
            None if self.max_attempts >= 2 => Some(self.max_attempts / 2),
            None => None,
        }
    }

    pub fn is_interim(&self, attempt: u32) -> bool {
        self.interim_at() == Some(attempt)
    }

    /// Upper bound on time spent polling.
    pub fn worst_case(&self) -> Duration {
        (1..=self.max_attempts).map(|a| self.delay_for(a)).sum()
    }
}
