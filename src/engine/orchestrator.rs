//! High-level coordinator: reserve → primary queue → live poll → fallback.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::dialogue::{BackupReserve, DialogueLine, DialogueQueue, StaticFallbackPool};

use super::retry::RetryPolicy;
use super::types::{LineSource, Resolution, RetryState, SourceCounts};

#[derive(Default)]
struct Counters {
    reserve: AtomicU64,
    primary: AtomicU64,
    live_poll: AtomicU64,
    fallback: AtomicU64,
}

/// Resolves exactly one line per admitted interaction.
///
/// The cascade always terminates: the fallback pool has no failure path.
/// The live poll gives up after `max_attempts` but never cancels the fetch
/// it was waiting on, so a late answer still lands in the primary queue.
pub struct RetryOrchestrator {
    primary: DialogueQueue,
    reserve: BackupReserve,
    fallback: StaticFallbackPool,
    policy: RetryPolicy,
    remote_enabled: AtomicBool,
    counters: Counters,
}

impl RetryOrchestrator {
    pub fn new(
        primary: DialogueQueue,
        reserve: BackupReserve,
        fallback: StaticFallbackPool,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            primary,
            reserve,
            fallback,
            policy,
            remote_enabled: AtomicBool::new(true),
            counters: Counters::default(),
        }
    }

    pub fn primary(&self) -> &DialogueQueue {
        &self.primary
    }

    pub fn reserve(&self) -> &BackupReserve {
        &self.reserve
    }

    pub fn fallback(&self) -> &StaticFallbackPool {
        &self.fallback
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn remote_enabled(&self) -> bool {
        self.remote_enabled.load(Ordering::Relaxed)
    }

    /// With remote generation off, empty buffers go straight to the fallback pool.
    pub fn set_remote_enabled(&self, enabled: bool) {
        self.remote_enabled.store(enabled, Ordering::Relaxed);
    }

    pub async fn resolve(&self) -> Resolution {
        self.resolve_with(|_| {}).await
    }

    /// Runs the cascade. `on_interim` receives the placeholder text once, at
    /// the configured poll attempt, if the poll is still unresolved there.
    #[instrument(skip_all, fields(resolution_id = %Uuid::new_v4()))]
    pub async fn resolve_with<F>(&self, mut on_interim: F) -> Resolution
    where
        F: FnMut(&str) + Send,
    {
        let reserve_hit = self.reserve.try_take();
        // an empty reserve is topped up too, so it recovers after an outage
        if self.remote_enabled() {
            self.reserve.refill_if_low();
        }
        if let Some(line) = reserve_hit {
            debug!(remaining = self.reserve.len(), "served from backup reserve");
            return self.finish(line, LineSource::Reserve, 0);
        }

        if let Some(line) = self.take_primary() {
            debug!(remaining = self.primary.len(), "served from primary queue");
            return self.finish(line, LineSource::Primary, 0);
        }

        let mut state = RetryState::new(self.policy.max_attempts);
        if self.remote_enabled() {
            if let Some(line) = self.poll_primary(&mut state, &mut on_interim).await {
                return self.finish(line, LineSource::LivePoll, state.attempt);
            }
            warn!(
                attempts = state.attempt,
                elapsed_ms = state.elapsed.as_millis() as u64,
                "live poll exhausted, using fallback line"
            );
        } else {
            debug!("remote generation disabled, using fallback line");
        }

        let line = self.fallback.pick();
        self.finish(line, LineSource::Fallback, state.attempt)
    }

    /// Primary head or a fallback line, without waiting on the network.
    pub fn resolve_immediate(&self) -> Resolution {
        match self.take_primary() {
            Some(line) => self.finish(line, LineSource::Primary, 0),
            None => {
                self.primary.request_refill_if_needed();
                let line = self.fallback.pick();
                self.finish(line, LineSource::Fallback, 0)
            }
        }
    }

    /// Aborts background fetches and refill batches of both queues and
    /// refuses new ones. Returns how many tasks were still running.
    pub fn shutdown(&self) -> usize {
        let primary = self.primary.tasks().shutdown();
        let reserve = self.reserve.queue().tasks().shutdown();
        primary + reserve
    }

    pub fn source_counts(&self) -> SourceCounts {
        SourceCounts {
            reserve: self.counters.reserve.load(Ordering::Relaxed),
            primary: self.counters.primary.load(Ordering::Relaxed),
            live_poll: self.counters.live_poll.load(Ordering::Relaxed),
            fallback: self.counters.fallback.load(Ordering::Relaxed),
        }
    }

    fn take_primary(&self) -> Option<DialogueLine> {
        let line = self.primary.try_take()?;
        self.primary.request_refill_if_needed();
        Some(line)
    }

    async fn poll_primary<F>(&self, state: &mut RetryState, on_interim: &mut F) -> Option<DialogueLine>
    where
        F: FnMut(&str) + Send,
    {
        while !state.exhausted() {
            state.attempt += 1;

            if self.primary.request_fetch() {
                debug!(attempt = state.attempt, "fresh primary fetch issued");
            }

            let delay = self.policy.delay_for(state.attempt);
            sleep(delay).await;
            state.elapsed += delay;

            if let Some(line) = self.take_primary() {
                return Some(line);
            }

            if !state.interim_shown && self.policy.is_interim(state.attempt) {
                debug!(attempt = state.attempt, "showing interim placeholder");
                on_interim(&self.policy.interim_text);
                state.interim_shown = true;
            }
        }
        None
    }

    fn finish(&self, line: DialogueLine, source: LineSource, attempts: u32) -> Resolution {
        let counter = match source {
            LineSource::Reserve => &self.counters.reserve,
            LineSource::Primary => &self.counters.primary,
            LineSource::LivePoll => &self.counters.live_poll,
            LineSource::Fallback => &self.counters.fallback,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        info!(source = ?source, attempts, line = %line, "line resolved");

        Resolution {
            line,
            source,
            attempts,
        }
    }
}
