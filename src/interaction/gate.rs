//! Cooldown gate in front of the resolution cascade.
//!
//! Repeated proximity/collision events inside the cooldown window collapse
//! into the first one. A rejected event has no side effects at all.

use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GatePhase {
    Idle,
    Resolving,
    Displaying,
}

#[derive(Debug, Clone)]
pub struct InteractionGate {
    cooldown: Duration,
    last_trigger: Option<Instant>,
    phase: GatePhase,
}

impl InteractionGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_trigger: None,
            phase: GatePhase::Idle,
        }
    }

    /// Accepts the event iff at least `cooldown` has passed since the last
    /// accepted one, recording `now` on success. An accepted event always
    /// starts a resolution, even while the previous line is still shown.
    pub fn admit(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_trigger {
            if now.saturating_duration_since(last) < self.cooldown {
                return false;
            }
        }
        self.last_trigger = Some(now);
        self.phase = GatePhase::Resolving;
        true
    }

    /// A line went up; restarts are handled by the display timer.
    pub fn mark_displaying(&mut self) {
        self.phase = GatePhase::Displaying;
    }

    pub fn mark_idle(&mut self) {
        self.phase = GatePhase::Idle;
    }

    /// Display timer expiry. Only a shown line returns the gate to `Idle`;
    /// an interim placeholder expiring mid-resolution leaves it `Resolving`.
    pub fn finish_display(&mut self) {
        if self.phase == GatePhase::Displaying {
            self.phase = GatePhase::Idle;
        }
    }

    pub fn phase(&self) -> GatePhase {
        self.phase
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn set_cooldown(&mut self, cooldown: Duration) {
        self.cooldown = cooldown;
    }

    pub fn last_trigger(&self) -> Option<Instant> {
        self.last_trigger
    }
}
