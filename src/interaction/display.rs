//! Display surface boundary and the visible-duration timer.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::gate::InteractionGate;

/// Whatever actually renders NPC text (a 3D label, a subtitle bar, a log).
pub trait DisplaySurface: Send + Sync {
    fn show(&self, text: &str, duration: Duration);
    fn hide(&self);
}

/// Headless surface that writes shown lines to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDisplay;

impl DisplaySurface for TracingDisplay {
    fn show(&self, text: &str, duration: Duration) {
        info!(text, duration_ms = duration.as_millis() as u64, "npc line shown");
    }

    fn hide(&self) {
        debug!("npc line hidden");
    }
}

/// Puts text on a surface and hides it again after the visible duration.
///
/// Showing again while a line is up replaces the text and restarts the timer.
/// Only the hide timer is ever cancelled, never a pending generation.
pub struct DisplayController {
    surface: Arc<dyn DisplaySurface>,
    gate: Arc<Mutex<InteractionGate>>,
    duration: Mutex<Duration>,
    hide_timer: Mutex<Option<JoinHandle<()>>>,
}

impl DisplayController {
    pub fn new(
        surface: Arc<dyn DisplaySurface>,
        gate: Arc<Mutex<InteractionGate>>,
        duration: Duration,
    ) -> Self {
        Self {
            surface,
            gate,
            duration: Mutex::new(duration),
            hide_timer: Mutex::new(None),
        }
    }

    pub fn duration(&self) -> Duration {
        *self.duration.lock()
    }

    pub fn set_duration(&self, duration: Duration) {
        *self.duration.lock() = duration;
    }

    /// Shows a resolved line and moves the gate to `Displaying`.
    pub fn show(&self, text: &str) {
        self.present(text);
        self.gate.lock().mark_displaying();
    }

    /// Shows a placeholder while resolution is still running; the gate phase
    /// is left alone.
    pub fn show_interim(&self, text: &str) {
        self.present(text);
    }

    pub fn hide(&self) {
        if let Some(timer) = self.hide_timer.lock().take() {
            timer.abort();
        }
        self.surface.hide();
        self.gate.lock().mark_idle();
    }

    pub fn is_showing(&self) -> bool {
        self.hide_timer
            .lock()
            .as_ref()
            .map(|timer| !timer.is_finished())
            .unwrap_or(false)
    }

    fn present(&self, text: &str) {
        let duration = self.duration();
        self.surface.show(text, duration);

        let surface = Arc::clone(&self.surface);
        let gate = Arc::clone(&self.gate);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            surface.hide();
            gate.lock().finish_display();
        });

        if let Some(previous) = self.hide_timer.lock().replace(timer) {
            previous.abort();
        }
    }
}

impl Drop for DisplayController {
    fn drop(&mut self) {
        if let Some(timer) = self.hide_timer.get_mut().take() {
            timer.abort();
        }
    }
}

#[cfg(test)]
pub(crate) mod recording {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub(crate) enum DisplayEvent {
        Shown(String),
        Hidden,
    }

    #[derive(Default)]
    pub(crate) struct RecordingDisplay {
        events: Mutex<Vec<DisplayEvent>>,
    }

    impl RecordingDisplay {
        pub(crate) fn events(&self) -> Vec<DisplayEvent> {
            self.events.lock().clone()
        }

        pub(crate) fn shown(&self) -> Vec<String> {
            self.events
                .lock()
                .iter()
                .filter_map(|e| match e {
                    DisplayEvent::Shown(text) => Some(text.clone()),
                    DisplayEvent::Hidden => None,
                })
                .collect()
        }
    }

    impl DisplaySurface for RecordingDisplay {
        fn show(&self, text: &str, _duration: Duration) {
            self.events.lock().push(DisplayEvent::Shown(text.to_string()));
        }

        fn hide(&self) {
            self.events.lock().push(DisplayEvent::Hidden);
        }
    }
}
