//! FIFO of ready-to-show lines with a single-flight refill guard.
//!
//! Lines enter only through a successful generation and leave only through
//! [`DialogueQueue::try_take`]. At most one generator call per queue is ever
//! outstanding; the flag is claimed before the request is issued and released
//! by a drop guard, so success, failure and task abort all clear it.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{debug, info, instrument, warn};

use super::tasks::TaskRegistry;
use super::DialogueLine;
use crate::llm::RemoteGenerator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Appended,
    /// The generator answered with nothing printable.
    Empty,
    Failed,
    AlreadyInFlight,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub started: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub skipped_empty: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueSnapshot {
    pub label: &'static str,
    pub len: usize,
    pub in_flight: bool,
    pub head: Vec<String>,
    pub stats: QueueStats,
}

#[derive(Default)]
struct Counters {
    started: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    skipped_empty: AtomicU64,
}

struct Shared {
    label: &'static str,
    low_water_mark: usize,
    lines: Mutex<VecDeque<DialogueLine>>,
    in_flight: AtomicBool,
    idle: Notify,
    generator: Arc<dyn RemoteGenerator>,
    tasks: TaskRegistry,
    counters: Counters,
}

struct InFlightGuard {
    shared: Arc<Shared>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.shared.in_flight.store(false, Ordering::Release);
        self.shared.idle.notify_waiters();
    }
}

/// Cheap to clone; clones share the same buffer and flag.
#[derive(Clone)]
pub struct DialogueQueue {
    shared: Arc<Shared>,
}

impl DialogueQueue {
    pub fn new(
        label: &'static str,
        generator: Arc<dyn RemoteGenerator>,
        low_water_mark: usize,
    ) -> Self {
        Self::with_tasks(label, generator, low_water_mark, TaskRegistry::new())
    }

    /// Background fetches are spawned on `tasks`, so closing it stops them.
    pub fn with_tasks(
        label: &'static str,
        generator: Arc<dyn RemoteGenerator>,
        low_water_mark: usize,
        tasks: TaskRegistry,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                label,
                low_water_mark,
                lines: Mutex::new(VecDeque::new()),
                in_flight: AtomicBool::new(false),
                idle: Notify::new(),
                generator,
                tasks,
                counters: Counters::default(),
            }),
        }
    }

    pub fn label(&self) -> &'static str {
        self.shared.label
    }

    pub fn low_water_mark(&self) -> usize {
        self.shared.low_water_mark
    }

    pub fn tasks(&self) -> &TaskRegistry {
        &self.shared.tasks
    }

    pub fn len(&self) -> usize {
        self.shared.lines.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.lines.lock().is_empty()
    }

    /// True exactly while a generator call for this queue is outstanding.
    pub fn is_fetching(&self) -> bool {
        self.shared.in_flight.load(Ordering::Acquire)
    }

    /// Pops the head. Never triggers a refill on its own.
    pub fn try_take(&self) -> Option<DialogueLine> {
        self.shared.lines.lock().pop_front()
    }

    pub fn peek(&self) -> Option<DialogueLine> {
        self.shared.lines.lock().front().cloned()
    }

    /// Up to `n` lines from the head, oldest first, without removing them.
    pub fn peek_front(&self, n: usize) -> Vec<DialogueLine> {
        self.shared.lines.lock().iter().take(n).cloned().collect()
    }

    pub fn needs_refill(&self) -> bool {
        self.len() < self.shared.low_water_mark
    }

    /// Starts a background fetch when below the low-water mark and idle.
    pub fn request_refill_if_needed(&self) -> bool {
        if !self.needs_refill() {
            return false;
        }
        self.request_fetch()
    }

    /// Starts a background fetch unless one is already outstanding or the
    /// queue's task registry has been shut down.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn request_fetch(&self) -> bool {
        match self.begin_fetch() {
            Some(guard) => {
                let spawned = self.shared.tasks.spawn(async move {
                    run_fetch(guard).await;
                });
                if spawned {
                    debug!(queue = self.label(), "background fetch scheduled");
                }
                spawned
            }
            None => false,
        }
    }

    /// Performs one fetch on the caller's task, or reports that one is pending.
    pub async fn fetch_once(&self) -> FetchOutcome {
        match self.begin_fetch() {
            Some(guard) => run_fetch(guard).await,
            None => FetchOutcome::AlreadyInFlight,
        }
    }

    /// Like [`fetch_once`](Self::fetch_once) but waits out a pending fetch
    /// and then issues its own instead of giving up.
    pub async fn fetch_exclusive(&self) -> FetchOutcome {
        loop {
            match self.fetch_once().await {
                FetchOutcome::AlreadyInFlight => self.wait_idle().await,
                outcome => return outcome,
            }
        }
    }

    /// Resolves once no fetch is outstanding.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.shared.idle.notified();
            if !self.is_fetching() {
                return;
            }
            notified.await;
        }
    }

    /// Runs `n` sequential fetches so the first interaction finds lines waiting.
    #[instrument(skip(self), fields(queue = self.label()))]
    pub async fn warm_up(&self, n: usize) -> usize {
        let mut appended = 0;
        for _ in 0..n {
            if self.fetch_exclusive().await == FetchOutcome::Appended {
                appended += 1;
            }
        }
        info!(appended, requested = n, len = self.len(), "warm-up finished");
        appended
    }

    /// Head of the queue, or `placeholder` when empty. Either way a refill is
    /// requested if the queue sits below its low-water mark.
    pub fn next_or_placeholder(&self, placeholder: &str) -> DialogueLine {
        let line = self.try_take();
        self.request_refill_if_needed();
        line.unwrap_or_else(|| DialogueLine::new(placeholder))
    }

    pub fn stats(&self) -> QueueStats {
        let c = &self.shared.counters;
        QueueStats {
            started: c.started.load(Ordering::Relaxed),
            succeeded: c.succeeded.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
            skipped_empty: c.skipped_empty.load(Ordering::Relaxed),
        }
    }

    pub fn snapshot(&self, head_len: usize) -> QueueSnapshot {
        let (len, head) = {
            let lines = self.shared.lines.lock();
            let head = lines
                .iter()
                .take(head_len)
                .map(|line| line.as_str().to_string())
                .collect();
            (lines.len(), head)
        };
        QueueSnapshot {
            label: self.label(),
            len,
            in_flight: self.is_fetching(),
            head,
            stats: self.stats(),
        }
    }

    #[cfg(test)]
    pub(crate) fn push_generated(&self, line: DialogueLine) {
        self.shared.lines.lock().push_back(line);
    }

    fn begin_fetch(&self) -> Option<InFlightGuard> {
        self.shared
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightGuard {
                shared: Arc::clone(&self.shared),
            })
    }
}

async fn run_fetch(guard: InFlightGuard) -> FetchOutcome {
    let shared = &guard.shared;
    let counters = &shared.counters;
    counters.started.fetch_add(1, Ordering::Relaxed);

    let outcome = match shared.generator.generate().await {
        Ok(raw) => match DialogueLine::from_generated(&raw) {
            Some(line) => {
                let len = {
                    let mut lines = shared.lines.lock();
                    lines.push_back(line);
                    lines.len()
                };
                counters.succeeded.fetch_add(1, Ordering::Relaxed);
                debug!(queue = shared.label, len, "line appended");
                FetchOutcome::Appended
            }
            None => {
                counters.skipped_empty.fetch_add(1, Ordering::Relaxed);
                warn!(queue = shared.label, "generator returned an empty line, skipping");
                FetchOutcome::Empty
            }
        },
        Err(e) => {
            counters.failed.fetch_add(1, Ordering::Relaxed);
            warn!(
                queue = shared.label,
                generator = shared.generator.name(),
                error = %e,
                "generation failed"
            );
            FetchOutcome::Failed
        }
    };

    drop(guard);
    outcome
}
