//! One NPC's reaction pipeline: gate → orchestrator → display.
//!
//! The reactor owns its queues outright; nothing is looked up globally.
//! Warm-up, preload, refill batches and background fetches all run on the
//! queues' [`TaskRegistry`] and are aborted by [`NpcReactor::shutdown`] or on
//! drop.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::config::{Config, ConfigError};
use crate::dialogue::{
    BackupReserve, DialogueQueue, FetchOutcome, QueueSnapshot, ReserveSnapshot, StaticFallbackPool,
    TaskRegistry,
};
use crate::engine::{RetryOrchestrator, RetryPolicy, Resolution, SourceCounts};
use crate::interaction::{DisplayController, DisplaySurface, GatePhase, InteractionGate};
use crate::llm::RemoteGenerator;

/// Lines of the reserve included in diagnostics.
const DIAGNOSTIC_HEAD: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Readiness {
    Starting,
    Ready,
    Stopped,
}

#[derive(Debug, Clone, Serialize)]
pub struct Diagnostics {
    pub npc: String,
    pub captured_at: DateTime<Utc>,
    pub phase: GatePhase,
    pub ready: bool,
    pub remote_enabled: bool,
    pub primary: QueueSnapshot,
    pub reserve: ReserveSnapshot,
    pub resolutions: SourceCounts,
}

pub struct NpcReactor {
    name: String,
    gate: Arc<Mutex<InteractionGate>>,
    orchestrator: Arc<RetryOrchestrator>,
    display: DisplayController,
    warm_up_count: usize,
    preload_on_start: bool,
    ready_tx: Arc<watch::Sender<Readiness>>,
}

impl NpcReactor {
    pub fn new(
        name: impl Into<String>,
        orchestrator: RetryOrchestrator,
        surface: Arc<dyn DisplaySurface>,
        config: &Config,
    ) -> Self {
        let gate = Arc::new(Mutex::new(InteractionGate::new(config.gate.cooldown())));
        let display = DisplayController::new(surface, Arc::clone(&gate), config.display.duration());
        let (ready_tx, _) = watch::channel(Readiness::Starting);
        let ready_tx = Arc::new(ready_tx);

        orchestrator.set_remote_enabled(config.retry.remote_enabled);

        Self {
            name: name.into(),
            gate,
            orchestrator: Arc::new(orchestrator),
            display,
            warm_up_count: config.primary.warm_up_count,
            preload_on_start: config.reserve.preload_on_start,
            ready_tx,
        }
    }

    /// Builds both queues on `generator`, each with its own in-flight flag
    /// and a shared task registry.
    pub fn from_config(
        name: impl Into<String>,
        config: &Config,
        generator: Arc<dyn RemoteGenerator>,
        surface: Arc<dyn DisplaySurface>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let fallback = StaticFallbackPool::new(&config.fallback.lines).map_err(|e| {
            ConfigError::Invalid {
                field: "fallback.lines",
                reason: e.to_string(),
            }
        })?;
        let tasks = TaskRegistry::new();
        let primary = DialogueQueue::with_tasks(
            "primary",
            Arc::clone(&generator),
            config.primary.low_water_mark,
            tasks.clone(),
        );
        let reserve = BackupReserve::with_tasks(generator, config.reserve.clone(), tasks);
        let orchestrator =
            RetryOrchestrator::new(primary, reserve, fallback, RetryPolicy::from(&config.retry));

        Ok(Self::new(name, orchestrator, surface, config))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn orchestrator(&self) -> &RetryOrchestrator {
        &self.orchestrator
    }

    pub fn phase(&self) -> GatePhase {
        self.gate.lock().phase()
    }

    /// True once warm-up finished, until [`shutdown`](Self::shutdown).
    pub fn is_ready(&self) -> bool {
        *self.ready_tx.borrow() == Readiness::Ready
    }

    /// Spawns primary warm-up and, if configured, the reserve preload.
    #[instrument(skip(self), fields(npc = %self.name))]
    pub fn start(&self) {
        let primary = self.orchestrator.primary().clone();
        let ready_tx = Arc::clone(&self.ready_tx);
        let warm_up_count = self.warm_up_count;
        let tasks = self.orchestrator.primary().tasks().clone();
        let started = tasks.spawn(async move {
            primary.warm_up(warm_up_count).await;
            ready_tx.send_if_modified(|state| {
                let starting = *state == Readiness::Starting;
                if starting {
                    *state = Readiness::Ready;
                }
                starting
            });
        });
        if !started {
            warn!("start called after shutdown, ignoring");
            return;
        }

        if self.preload_on_start {
            let reserve = self.orchestrator.reserve().clone();
            let count = reserve.settings().preload_count;
            let settle_delay = reserve.settings().settle_delay();
            let reserve_tasks = reserve.queue().tasks().clone();
            reserve_tasks.spawn(async move {
                reserve.preload(count, settle_delay).await;
            });
        }
        info!(warm_up_count, preload = self.preload_on_start, "npc reactor started");
    }

    /// Resolves once the primary warm-up has finished (`true`) or the reactor
    /// was shut down first (`false`).
    pub async fn wait_ready(&self) -> bool {
        let mut rx = self.ready_tx.subscribe();
        let ready = match rx.wait_for(|state| *state != Readiness::Starting).await {
            Ok(state) => *state == Readiness::Ready,
            Err(_) => false,
        };
        ready
    }

    /// Handles one proximity/collision event at time `now`.
    ///
    /// Returns `None` when the cooldown drops the event; in that case no
    /// queue is touched.
    #[instrument(skip(self), fields(npc = %self.name))]
    pub async fn on_trigger(&self, now: Instant) -> Option<Resolution> {
        if !self.gate.lock().admit(now) {
            debug!("trigger dropped by cooldown");
            return None;
        }

        let display = &self.display;
        let resolution = self
            .orchestrator
            .resolve_with(|text| display.show_interim(text))
            .await;

        self.display.show(resolution.line.as_str());
        Some(resolution)
    }

    pub async fn trigger_now(&self) -> Option<Resolution> {
        self.on_trigger(Instant::now()).await
    }

    /// Shows something right away, bypassing the gate and the live poll.
    pub fn force_show_message(&self) -> Resolution {
        let resolution = self.orchestrator.resolve_immediate();
        self.display.show(resolution.line.as_str());
        resolution
    }

    pub fn show_custom_message(&self, text: &str) {
        self.display.show(text);
    }

    /// Runs `n` primary fetches back to back; returns how many added a line.
    pub async fn force_generate(&self, n: usize) -> usize {
        let primary = self.orchestrator.primary();
        let mut appended = 0;
        for _ in 0..n {
            if primary.fetch_exclusive().await == FetchOutcome::Appended {
                appended += 1;
            }
        }
        debug!(npc = %self.name, appended, requested = n, "forced generation finished");
        appended
    }

    pub fn set_display_duration(&self, duration: Duration) {
        self.display.set_duration(duration);
    }

    pub fn set_cooldown(&self, cooldown: Duration) {
        self.gate.lock().set_cooldown(cooldown);
    }

    pub fn set_remote_enabled(&self, enabled: bool) {
        self.orchestrator.set_remote_enabled(enabled);
    }

    pub fn diagnostics(&self) -> Diagnostics {
        Diagnostics {
            npc: self.name.clone(),
            captured_at: Utc::now(),
            phase: self.phase(),
            ready: self.is_ready(),
            remote_enabled: self.orchestrator.remote_enabled(),
            primary: self.orchestrator.primary().snapshot(DIAGNOSTIC_HEAD),
            reserve: self.orchestrator.reserve().snapshot(DIAGNOSTIC_HEAD),
            resolutions: self.orchestrator.source_counts(),
        }
    }

    pub fn diagnostics_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.diagnostics())
    }

    /// Aborts all background work, refuses new work, releases anyone in
    /// [`wait_ready`](Self::wait_ready) and clears the display.
    #[instrument(skip(self), fields(npc = %self.name))]
    pub fn shutdown(&self) {
        let aborted = self.orchestrator.shutdown();
        self.ready_tx.send_replace(Readiness::Stopped);
        self.display.hide();
        info!(aborted, "npc reactor shut down");
    }
}

impl Drop for NpcReactor {
    fn drop(&mut self) {
        self.orchestrator.shutdown();
        self.ready_tx.send_replace(Readiness::Stopped);
    }
}
