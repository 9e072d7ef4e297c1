//! Warm backup reserve.
//!
//! A second, independent queue that is preloaded at startup and topped up in
//! small batches. It exists to absorb bursts of interactions that arrive faster
//! than the generator can answer. Its fetches never contend with the primary
//! queue's flag; preload and refill share one `replenishing` flag so only one
//! batch runs at a time.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::queue::{DialogueQueue, FetchOutcome, QueueSnapshot};
use super::tasks::TaskRegistry;
use super::DialogueLine;
use crate::config::ReserveConfig;
use crate::llm::RemoteGenerator;

#[derive(Debug, Clone, Serialize)]
pub struct ReserveSnapshot {
    #[serde(flatten)]
    pub queue: QueueSnapshot,
    pub replenishing: bool,
    pub total_preloaded: usize,
}

struct Shared {
    settings: ReserveConfig,
    replenishing: AtomicBool,
    total_preloaded: AtomicUsize,
}

struct ReplenishGuard {
    shared: Arc<Shared>,
}

impl Drop for ReplenishGuard {
    fn drop(&mut self) {
        self.shared.replenishing.store(false, Ordering::Release);
    }
}

#[derive(Clone)]
pub struct BackupReserve {
    queue: DialogueQueue,
    shared: Arc<Shared>,
}

impl BackupReserve {
    pub fn new(generator: Arc<dyn RemoteGenerator>, settings: ReserveConfig) -> Self {
        Self::with_tasks(generator, settings, TaskRegistry::new())
    }

    /// Refill batches and background fetches are spawned on `tasks`.
    pub fn with_tasks(
        generator: Arc<dyn RemoteGenerator>,
        settings: ReserveConfig,
        tasks: TaskRegistry,
    ) -> Self {
        let queue =
            DialogueQueue::with_tasks("reserve", generator, settings.refill_threshold, tasks);
        Self {
            queue,
            shared: Arc::new(Shared {
                settings,
                replenishing: AtomicBool::new(false),
                total_preloaded: AtomicUsize::new(0),
            }),
        }
    }

    pub fn queue(&self) -> &DialogueQueue {
        &self.queue
    }

    pub fn settings(&self) -> &ReserveConfig {
        &self.shared.settings
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn try_take(&self) -> Option<DialogueLine> {
        self.queue.try_take()
    }

    pub fn peek_front(&self, n: usize) -> Vec<DialogueLine> {
        self.queue.peek_front(n)
    }

    /// True while a preload or refill batch is running.
    pub fn is_replenishing(&self) -> bool {
        self.shared.replenishing.load(Ordering::Acquire)
    }

    /// Lines added by [`preload`](Self::preload) over the reserve's lifetime.
    pub fn total_preloaded(&self) -> usize {
        self.shared.total_preloaded.load(Ordering::Relaxed)
    }

    /// Waits `settle_delay`, then runs `count` generate cycles with a pause
    /// after each. Blank or failed results are skipped. Returns how many
    /// lines were added; 0 if another batch already holds the reserve.
    #[instrument(skip(self))]
    pub async fn preload(&self, count: usize, settle_delay: Duration) -> usize {
        let Some(guard) = self.begin_replenish() else {
            debug!("preload skipped, reserve already replenishing");
            return 0;
        };

        tokio::time::sleep(settle_delay).await;
        info!(count, "preloading backup reserve");

        let added = self.run_cycles(count, "preload").await;
        self.shared.total_preloaded.fetch_add(added, Ordering::Relaxed);
        drop(guard);

        info!(added, len = self.len(), "backup reserve preload finished");
        added
    }

    /// Background [`preload`](Self::preload) with the configured count and delay.
    pub fn spawn_preload(&self) -> JoinHandle<usize> {
        let reserve = self.clone();
        let count = self.shared.settings.preload_count;
        let settle_delay = self.shared.settings.settle_delay();
        tokio::spawn(async move { reserve.preload(count, settle_delay).await })
    }

    /// Schedules a refill batch when the reserve dropped below its threshold
    /// and no batch is running. Returns whether one was scheduled.
    pub fn refill_if_low(&self) -> bool {
        if self.len() >= self.shared.settings.refill_threshold {
            return false;
        }
        let Some(guard) = self.begin_replenish() else {
            return false;
        };

        let reserve = self.clone();
        let batch = self.shared.settings.refill_batch;
        let spawned = self.queue.tasks().spawn(async move {
            let added = reserve.run_cycles(batch, "refill").await;
            drop(guard);
            info!(added, len = reserve.len(), "backup reserve refill finished");
        });
        if spawned {
            debug!(len = self.len(), batch, "backup reserve refill scheduled");
        }
        spawned
    }

    pub fn snapshot(&self, head_len: usize) -> ReserveSnapshot {
        ReserveSnapshot {
            queue: self.queue.snapshot(head_len),
            replenishing: self.is_replenishing(),
            total_preloaded: self.total_preloaded(),
        }
    }

    async fn run_cycles(&self, count: usize, phase: &'static str) -> usize {
        let pause = self.shared.settings.inter_request_pause();
        let mut added = 0;

        for i in 0..count {
            if self.queue.tasks().is_closed() {
                debug!(phase, cycle = i + 1, "reserve shut down, stopping early");
                break;
            }
            debug!(phase, cycle = i + 1, of = count, "reserve generate cycle");
            match self.queue.fetch_exclusive().await {
                FetchOutcome::Appended => added += 1,
                FetchOutcome::Empty => warn!(phase, cycle = i + 1, "empty line skipped"),
                FetchOutcome::Failed | FetchOutcome::AlreadyInFlight => {}
            }
            tokio::time::sleep(pause).await;
        }

        added
    }

    fn begin_replenish(&self) -> Option<ReplenishGuard> {
        self.shared
            .replenishing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ReplenishGuard {
                shared: Arc::clone(&self.shared),
            })
    }
}
