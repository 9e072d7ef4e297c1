//! Background work spawned on behalf of the queues.
//!
//! Every refill, fetch, warm-up and preload goes through one registry so that
//! tearing an NPC down aborts all of it. Once closed, the registry refuses new
//! work.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Default)]
struct Inner {
    handles: Vec<JoinHandle<()>>,
    closed: bool,
}

/// Cheap to clone; clones share the same set of handles.
#[derive(Clone, Default)]
pub struct TaskRegistry {
    inner: Arc<Mutex<Inner>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns `task` unless the registry is closed. Returns whether it ran.
    pub fn spawn<F>(&self, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut inner = self.inner.lock();
        if inner.closed {
            debug!("registry closed, background task not started");
            return false;
        }
        inner.handles.retain(|handle| !handle.is_finished());
        inner.handles.push(tokio::spawn(task));
        true
    }

    /// Tasks spawned and not yet finished.
    pub fn active(&self) -> usize {
        self.inner
            .lock()
            .handles
            .iter()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Closes the registry and aborts everything still running.
    /// Returns how many tasks were aborted.
    pub fn shutdown(&self) -> usize {
        let handles = {
            let mut inner = self.inner.lock();
            inner.closed = true;
            std::mem::take(&mut inner.handles)
        };

        let mut aborted = 0;
        for handle in handles {
            if !handle.is_finished() {
                aborted += 1;
            }
            handle.abort();
        }
        aborted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn shutdown_aborts_running_work() {
        let registry = TaskRegistry::new();
        let finished = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&finished);
        assert!(registry.spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            flag.store(true, Ordering::SeqCst);
        }));
        assert_eq!(registry.active(), 1);

        assert_eq!(registry.shutdown(), 1);
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert!(!finished.load(Ordering::SeqCst));
        assert_eq!(registry.active(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn closed_registry_refuses_new_work() {
        let registry = TaskRegistry::new();
        registry.shutdown();

        assert!(registry.is_closed());
        assert!(!registry.spawn(async {}));
        assert_eq!(registry.active(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn finished_handles_are_pruned() {
        let registry = TaskRegistry::new();
        for _ in 0..3 {
            registry.spawn(async {});
        }
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(registry.active(), 0);
        assert_eq!(registry.shutdown(), 0);
    }
}
