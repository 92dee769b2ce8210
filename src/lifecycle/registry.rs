//! In-flight task registry.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::observability::metrics;
use crate::transport::TaskHandle;

#[derive(Debug)]
struct InFlightTask {
    /// Distinguishes re-registrations under the same id.
    serial: u64,
    handle: Box<dyn TaskHandle>,
    registered_at: Instant,
    context: Option<String>,
}

impl InFlightTask {
    fn abort(&self, id: &str) {
        if let Err(e) = self.handle.abort() {
            tracing::debug!(request_id = %id, error = %e, "Abort failed; ignoring");
        }
    }
}

/// Tracks abortable calls by request id.
#[derive(Debug, Default)]
pub struct RequestRegistry {
    tasks: DashMap<String, InFlightTask>,
    serial: AtomicU64,
}

impl RequestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task. An existing task under the same id is aborted first.
    ///
    /// The entry is removed when the returned guard drops, unless a newer
    /// registration has taken the id in the meantime.
    pub fn register(
        self: &Arc<Self>,
        id: impl Into<String>,
        handle: Box<dyn TaskHandle>,
        context: Option<String>,
    ) -> TaskGuard {
        let id = id.into();
        let serial = self.serial.fetch_add(1, Ordering::Relaxed);
        let task = InFlightTask {
            serial,
            handle,
            registered_at: Instant::now(),
            context,
        };

        // The previous handle is aborted before the new one becomes visible
        if let Some((_, previous)) = self.tasks.remove(&id) {
            tracing::debug!(request_id = %id, "Superseding in-flight task with the same id");
            previous.abort(&id);
            metrics::record_cancelled("superseded", 1);
        }
        if let Some(raced) = self.tasks.insert(id.clone(), task) {
            raced.abort(&id);
            metrics::record_cancelled("superseded", 1);
        }
        metrics::record_registry_size(self.tasks.len());

        TaskGuard {
            registry: self.clone(),
            id,
            serial,
        }
    }

    /// Abort and remove one task. Returns whether it was registered.
    pub fn cancel(&self, id: &str) -> bool {
        match self.tasks.remove(id) {
            Some((id, task)) => {
                task.abort(&id);
                tracing::debug!(request_id = %id, "Cancelled request");
                metrics::record_cancelled("explicit", 1);
                metrics::record_registry_size(self.tasks.len());
                true
            }
            None => false,
        }
    }

    /// Abort every task registered with `context`.
    pub fn cancel_by_context(&self, context: &str) -> usize {
        let count = self.cancel_where("context", |task| task.context.as_deref() == Some(context));
        if count > 0 {
            tracing::info!(context, count, "Cancelled requests for context");
        }
        count
    }

    pub fn cancel_all(&self) -> usize {
        let count = self.cancel_where("all", |_| true);
        if count > 0 {
            tracing::info!(count, "Cancelled all in-flight requests");
        }
        count
    }

    /// Abort tasks registered longer than `max_age` ago.
    pub fn sweep_stale(&self, max_age: Duration) -> usize {
        let count = self.cancel_where("stale", |task| task.registered_at.elapsed() > max_age);
        if count > 0 {
            tracing::warn!(count, max_age_secs = max_age.as_secs(), "Cancelled stale requests");
        }
        count
    }

    fn cancel_where(&self, reason: &'static str, predicate: impl Fn(&InFlightTask) -> bool) -> usize {
        let ids: Vec<String> = self
            .tasks
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.key().clone())
            .collect();

        let mut count = 0;
        for id in ids {
            // Re-check: the task may have finished or been replaced since the scan
            if let Some((id, task)) = self.tasks.remove_if(&id, |_, task| predicate(task)) {
                task.abort(&id);
                count += 1;
            }
        }
        if count > 0 {
            metrics::record_cancelled(reason, count);
            metrics::record_registry_size(self.tasks.len());
        }
        count
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tasks.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    fn unregister(&self, id: &str, serial: u64) {
        if self.tasks.remove_if(id, |_, task| task.serial == serial).is_some() {
            metrics::record_registry_size(self.tasks.len());
        }
    }
}

/// Removes its task from the registry on drop, however the call ended.
#[derive(Debug)]
pub struct TaskGuard {
    registry: Arc<RequestRegistry>,
    id: String,
    serial: u64,
}

impl TaskGuard {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.registry.unregister(&self.id, self.serial);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportError;
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Mutex, Weak};

    #[derive(Debug, Default)]
    struct CountingHandle {
        aborts: Arc<AtomicUsize>,
        fail: bool,
    }

    impl TaskHandle for CountingHandle {
        fn abort(&self) -> Result<(), TransportError> {
            self.aborts.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(TransportError::InvalidRequest("already finished".into()))
            } else {
                Ok(())
            }
        }
    }

    fn handle(aborts: &Arc<AtomicUsize>) -> Box<dyn TaskHandle> {
        Box::new(CountingHandle {
            aborts: aborts.clone(),
            fail: false,
        })
    }

    #[test]
    fn test_guard_unregisters() {
        let registry = Arc::new(RequestRegistry::new());
        let aborts = Arc::new(AtomicUsize::new(0));
        {
            let _guard = registry.register("a", handle(&aborts), None);
            assert!(registry.contains("a"));
        }
        assert!(registry.is_empty());
        assert_eq!(aborts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_same_id_supersedes() {
        let registry = Arc::new(RequestRegistry::new());
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let old_guard = registry.register("search", handle(&first), None);
        let _new_guard = registry.register("search", handle(&second), None);
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len(), 1);

        // The superseded call finishing must not evict its replacement
        drop(old_guard);
        assert!(registry.contains("search"));
        assert!(registry.cancel("search"));
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    /// Records what the registry held at the moment of the abort.
    #[derive(Debug)]
    struct SnapshotHandle {
        registry: Weak<RequestRegistry>,
        seen: Arc<Mutex<Option<(usize, bool)>>>,
    }

    impl TaskHandle for SnapshotHandle {
        fn abort(&self) -> Result<(), TransportError> {
            if let Some(registry) = self.registry.upgrade() {
                *self.seen.lock().unwrap() = Some((registry.len(), registry.contains("search")));
            }
            Ok(())
        }
    }

    #[test]
    fn test_previous_aborted_before_replacement_is_stored() {
        let registry = Arc::new(RequestRegistry::new());
        let seen = Arc::new(Mutex::new(None));
        let aborts = Arc::new(AtomicUsize::new(0));

        let _old = registry.register(
            "search",
            Box::new(SnapshotHandle {
                registry: Arc::downgrade(&registry),
                seen: seen.clone(),
            }),
            None,
        );
        let _new = registry.register("search", handle(&aborts), None);

        assert_eq!(*seen.lock().unwrap(), Some((0, false)));
        assert_eq!(registry.len(), 1);
        assert_eq!(aborts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_cancel_by_context() {
        let registry = Arc::new(RequestRegistry::new());
        let aborts = Arc::new(AtomicUsize::new(0));
        let _a = registry.register("a", handle(&aborts), Some("orders".into()));
        let _b = registry.register("b", handle(&aborts), Some("orders".into()));
        let _c = registry.register("c", handle(&aborts), Some("profile".into()));

        assert_eq!(registry.cancel_by_context("orders"), 2);
        assert_eq!(registry.cancel_by_context("orders"), 0);
        assert!(registry.contains("c"));
        assert_eq!(registry.cancel_all(), 1);
        assert_eq!(aborts.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_abort_errors_are_swallowed() {
        let registry = Arc::new(RequestRegistry::new());
        let aborts = Arc::new(AtomicUsize::new(0));
        let _guard = registry.register(
            "a",
            Box::new(CountingHandle {
                aborts: aborts.clone(),
                fail: true,
            }),
            None,
        );
        assert!(registry.cancel("a"));
        assert!(!registry.cancel("a"));
        assert!(!registry.cancel("never-registered"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_stale() {
        let registry = Arc::new(RequestRegistry::new());
        let aborts = Arc::new(AtomicUsize::new(0));
        let _old = registry.register("old", handle(&aborts), None);
        tokio::time::advance(Duration::from_secs(31)).await;
        let _young = registry.register("young", handle(&aborts), None);

        assert_eq!(registry.sweep_stale(Duration::from_secs(30)), 1);
        assert!(registry.contains("young"));
        assert!(!registry.contains("old"));
    }
}
