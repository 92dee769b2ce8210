//! Background maintenance loops.
//!
//! # Responsibilities
//! - Periodically cancel in-flight tasks older than the stale threshold
//! - Periodically purge expired cache entries
//! - Exit promptly on shutdown

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};

use crate::cache::CacheStore;
use crate::lifecycle::registry::RequestRegistry;

pub struct StaleTaskSweeper {
    registry: Arc<RequestRegistry>,
    max_age: Duration,
    interval: Duration,
}

impl StaleTaskSweeper {
    pub fn new(registry: Arc<RequestRegistry>, max_age: Duration, interval: Duration) -> Self {
        Self {
            registry,
            max_age,
            interval,
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            max_age_secs = self.max_age.as_secs(),
            "Stale task sweeper starting"
        );

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.registry.sweep_stale(self.max_age);
                }
                _ = shutdown.recv() => {
                    tracing::info!("Stale task sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

pub struct CachePurger {
    cache: CacheStore,
    interval: Duration,
}

impl CachePurger {
    pub fn new(cache: CacheStore, interval: Duration) -> Self {
        Self { cache, interval }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.cache.purge_expired();
                }
                _ = shutdown.recv() => {
                    tracing::debug!("Cache purger received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Shutdown;
    use crate::transport::{TaskHandle, TransportError};

    #[derive(Debug)]
    struct NoopHandle;

    impl TaskHandle for NoopHandle {
        fn abort(&self) -> Result<(), TransportError> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_cancels_stale_and_stops() {
        let registry = Arc::new(RequestRegistry::new());
        let _guard = registry.register("slow", Box::new(NoopHandle), None);

        let shutdown = Shutdown::new();
        let sweeper = StaleTaskSweeper::new(
            registry.clone(),
            Duration::from_secs(30),
            Duration::from_secs(10),
        );
        let task = tokio::spawn(sweeper.run(shutdown.subscribe()));

        time::sleep(Duration::from_secs(25)).await;
        assert!(registry.contains("slow"));

        time::sleep(Duration::from_secs(20)).await;
        assert!(!registry.contains("slow"));

        shutdown.trigger();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_purger_drops_expired_entries() {
        let cache = CacheStore::new();
        cache.set("k", serde_json::json!(1), Duration::from_secs(5));

        let shutdown = Shutdown::new();
        let task = tokio::spawn(CachePurger::new(cache.clone(), Duration::from_secs(10)).run(shutdown.subscribe()));

        time::sleep(Duration::from_secs(11)).await;
        assert!(cache.is_empty());

        shutdown.trigger();
        task.await.unwrap();
    }
}
