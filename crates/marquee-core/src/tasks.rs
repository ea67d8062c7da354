//! Keyed registry of cancellable background tasks
//!
//! Spawning under a key aborts whatever was registered under that key
//! before. Session teardown goes through [`TaskRegistry::cancel_all`].

use std::collections::HashMap;
use std::future::Future;
use tokio::task::JoinHandle;
use tracing::debug;

/// Periodic progress observer
pub const PROGRESS_OBSERVER: &str = "progress_observer";
/// Per-second autoplay countdown
pub const AUTOPLAY_COUNTDOWN: &str = "autoplay_countdown";
/// Best-effort next item lookup
pub const NEXT_ITEM_LOOKUP: &str = "next_item_lookup";

#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: HashMap<&'static str, JoinHandle<()>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a task under `key`, cancelling the previous one
    pub fn spawn<F>(&mut self, key: &'static str, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if let Some(previous) = self.tasks.insert(key, tokio::spawn(future)) {
            debug!(task = key, "Replacing running task");
            previous.abort();
        }
    }

    /// Cancel the task under `key`; returns whether one was running
    pub fn cancel(&mut self, key: &str) -> bool {
        match self.tasks.remove(key) {
            Some(handle) => {
                let running = !handle.is_finished();
                handle.abort();
                running
            }
            None => false,
        }
    }

    /// Cancel everything and return the handles so callers can await them
    pub fn cancel_all(&mut self) -> Vec<JoinHandle<()>> {
        let handles: Vec<JoinHandle<()>> = self.tasks.drain().map(|(_, h)| h).collect();
        for handle in &handles {
            handle.abort();
        }
        if !handles.is_empty() {
            debug!(count = handles.len(), "Cancelled session tasks");
        }
        handles
    }

    pub fn is_running(&self, key: &str) -> bool {
        self.tasks.get(key).is_some_and(|h| !h.is_finished())
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl Drop for TaskRegistry {
    fn drop(&mut self) {
        for handle in self.tasks.values() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_same_key_replaces_previous() {
        let mut registry = TaskRegistry::new();
        let first_done = Arc::new(AtomicBool::new(false));

        let flag = first_done.clone();
        registry.spawn(PROGRESS_OBSERVER, async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            flag.store(true, Ordering::SeqCst);
        });
        registry.spawn(PROGRESS_OBSERVER, async {
            tokio::time::sleep(Duration::from_secs(60)).await;
        });

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(!first_done.load(Ordering::SeqCst));
        assert_eq!(registry.len(), 1);
        assert!(registry.is_running(PROGRESS_OBSERVER));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all() {
        let mut registry = TaskRegistry::new();
        registry.spawn(PROGRESS_OBSERVER, std::future::pending());
        registry.spawn(AUTOPLAY_COUNTDOWN, std::future::pending());

        let handles = registry.cancel_all();
        assert_eq!(handles.len(), 2);
        for handle in handles {
            assert!(handle.await.unwrap_err().is_cancelled());
        }
        assert!(registry.is_empty());
        assert!(!registry.cancel(AUTOPLAY_COUNTDOWN));
    }
}
