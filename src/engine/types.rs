//! Shared structs.

use serde::Serialize;
use std::time::Duration;

use crate::dialogue::DialogueLine;

/// Where a resolved line came from, in cascade order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LineSource {
    Reserve,
    Primary,
    LivePoll,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub line: DialogueLine,
    pub source: LineSource,
    /// Poll attempts spent; 0 when a buffer answered straight away.
    pub attempts: u32,
}

/// Per-resolution poll bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryState {
    pub attempt: u32,
    pub max_attempts: u32,
    pub elapsed: Duration,
    pub interim_shown: bool,
}

impl RetryState {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    pub fn exhausted(&self) -> bool {
        self.attempt >= self.max_attempts
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SourceCounts {
    pub reserve: u64,
    pub primary: u64,
    pub live_poll: u64,
    pub fallback: u64,
}

impl SourceCounts {
    pub fn total(&self) -> u64 {
        self.reserve + self.primary + self.live_poll + self.fallback
    }
}
