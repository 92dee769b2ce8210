//! Keyed debounce and throttle.
//!
//! Debounce postpones an action until `delay` passes without another call for
//! the same key; only the last one runs. Throttle runs an action at most once
//! per `interval` per key and drops the rest.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;

#[derive(Debug, Default)]
pub struct Debouncer {
    pending: Arc<DashMap<String, (u64, JoinHandle<()>)>>,
    generation: AtomicU64,
}

impl Debouncer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `action` for `key`, replacing any call still waiting.
    pub fn debounce<F, Fut>(&self, key: impl Into<String>, delay: Duration, action: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let key = key.into();
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let pending = self.pending.clone();
        let task_key = key.clone();

        // The task waits until its entry is in the map, so its own removal can never
        // run first and strand a finished entry.
        let (armed_tx, armed_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            if armed_rx.await.is_err() {
                return;
            }
            tokio::time::sleep(delay).await;
            // Leave the map before running so a newer call cannot abort us mid-action
            pending.remove_if(&task_key, |_, (current, _)| *current == generation);
            action().await;
        });

        if let Some((_, previous)) = self.pending.insert(key.clone(), (generation, task)) {
            tracing::trace!(key = %key, "Debounced call replaced");
            previous.abort();
        }
        let _ = armed_tx.send(());
    }

    /// Drop the waiting call for `key`, if any.
    pub fn cancel(&self, key: &str) -> bool {
        match self.pending.remove(key) {
            Some((_, (_, task))) => {
                task.abort();
                true
            }
            None => false,
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

#[derive(Debug, Default)]
pub struct Throttler {
    /// End of the current window per key.
    windows: DashMap<String, Instant>,
}

impl Throttler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `action` unless `key` ran within the last `interval`.
    pub fn throttle<R>(
        &self,
        key: impl Into<String>,
        interval: Duration,
        action: impl FnOnce() -> R,
    ) -> Option<R> {
        let now = Instant::now();
        // Closed windows carry no state; drop them so the map tracks live keys only
        self.windows.retain(|_, until| *until > now);

        match self.windows.entry(key.into()) {
            Entry::Occupied(_) => return None,
            Entry::Vacant(entry) => {
                entry.insert(now + interval);
            }
        }
        Some(action())
    }

    /// Forget `key` so its next call runs immediately.
    pub fn reset(&self, key: &str) {
        self.windows.remove(key);
    }

    /// Keys whose window is still open (or not yet pruned).
    pub fn tracked(&self) -> usize {
        self.windows.len()
    }
}
