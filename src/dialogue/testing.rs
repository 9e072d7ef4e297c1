//! Scripted generator shared by the unit tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::llm::{GenerationError, RemoteGenerator};

/// Replays a script of responses (`None` = failure), then a fixed tail.
pub(crate) struct ScriptedGenerator {
    script: Mutex<VecDeque<Option<String>>>,
    tail: Option<String>,
    latency: Duration,
    calls: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedGenerator {
    pub(crate) fn always(text: &str) -> Self {
        Self::build(Vec::new(), Some(text.to_string()))
    }

    pub(crate) fn failing() -> Self {
        Self::build(Vec::new(), None)
    }

    /// Each step answers one call; once exhausted every call fails.
    pub(crate) fn script<I>(steps: I) -> Self
    where
        I: IntoIterator<Item = Option<&'static str>>,
    {
        Self::build(steps.into_iter().map(|s| s.map(String::from)).collect(), None)
    }

    /// `prefix-1`, `prefix-2`, … for `n` calls, failing afterwards.
    pub(crate) fn numbered(prefix: &str, n: usize) -> Self {
        Self::build(
            (1..=n).map(|i| Some(format!("{}-{}", prefix, i))).collect(),
            None,
        )
    }

    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn build(script: Vec<Option<String>>, tail: Option<String>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            tail,
            latency: Duration::ZERO,
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl RemoteGenerator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now_active, Ordering::SeqCst);

        let step = self.script.lock().pop_front();
        let response = match step {
            Some(step) => step,
            None => self.tail.clone(),
        };

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        response.ok_or_else(|| GenerationError::Network("scripted failure".to_string()))
    }
}
