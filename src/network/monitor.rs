//! Network state monitor.
//!
//! # Responsibilities
//! - Hold the latest connectivity snapshot and broadcast changes
//! - Toast once when connectivity comes back
//! - Own the "offline dialog already shown" flag, reset on recovery
//! - Gate heavy operations on connectivity and link quality

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

use crate::error::ApiError;
use crate::network::state::NetworkState;
use crate::notify::{Modal, Notifier};
use crate::observability::metrics;

/// What an `update` changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    WentOffline,
    Recovered,
    ClassChanged,
}

/// Options for [`NetworkMonitor::check_and_execute`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecuteOptions {
    /// Ask the user before running on a weak link.
    pub confirm_on_weak_network: bool,
}

pub struct NetworkMonitor {
    tx: watch::Sender<NetworkState>,
    notifier: Arc<dyn Notifier>,
    offline_notice_shown: AtomicBool,
}

impl NetworkMonitor {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self::with_state(notifier, NetworkState::default())
    }

    pub fn with_state(notifier: Arc<dyn Notifier>, initial: NetworkState) -> Self {
        let (tx, _) = watch::channel(initial);
        metrics::record_network_online(initial.connected);
        Self {
            tx,
            notifier,
            offline_notice_shown: AtomicBool::new(false),
        }
    }

    pub fn current(&self) -> NetworkState {
        *self.tx.borrow()
    }

    pub fn is_online(&self) -> bool {
        self.current().connected
    }

    pub fn is_good_network(&self) -> bool {
        self.current().is_good()
    }

    /// Receive every state change. The current state is delivered first.
    pub fn subscribe(&self) -> watch::Receiver<NetworkState> {
        let mut rx = self.tx.subscribe();
        rx.mark_changed();
        rx
    }

    /// Apply a platform report. Returns what changed, if anything.
    pub fn update(&self, next: NetworkState) -> Option<Transition> {
        let previous = self.current();
        if previous == next {
            return None;
        }
        self.tx.send_replace(next);
        metrics::record_network_online(next.connected);

        let transition = match (previous.connected, next.connected) {
            (true, false) => Transition::WentOffline,
            (false, true) => Transition::Recovered,
            _ => Transition::ClassChanged,
        };

        match transition {
            Transition::WentOffline => {
                tracing::warn!(class = %next.class, "Network connection lost");
            }
            Transition::Recovered => {
                self.offline_notice_shown.store(false, Ordering::SeqCst);
                tracing::info!(class = %next.class, "Network connection restored");
                self.notifier.toast("Network connection restored");
            }
            Transition::ClassChanged => {
                tracing::debug!(from = %previous.class, to = %next.class, "Network class changed");
            }
        }
        Some(transition)
    }

    /// True for the first caller since the last recovery.
    pub fn claim_offline_notice(&self) -> bool {
        !self.offline_notice_shown.swap(true, Ordering::SeqCst)
    }

    /// Run `operation` if the network allows it.
    ///
    /// Offline: shows a blocking dialog and fails with an offline error.
    /// Weak link with confirmation requested: asks the user and returns
    /// `Ok(None)` if they decline.
    pub async fn check_and_execute<T, F, Fut>(
        &self,
        options: ExecuteOptions,
        operation: F,
    ) -> Result<Option<T>, ApiError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let state = self.current();
        if state.is_offline() {
            self.notifier.modal(Modal::blocking(
                "No network connection",
                "This action needs a network connection.",
            ));
            return Err(ApiError::offline());
        }

        if options.confirm_on_weak_network && !state.is_good() {
            let proceed = self
                .notifier
                .confirm(
                    "Weak network",
                    &format!("You are on a {} connection. Continue anyway?", state.class),
                )
                .await;
            if !proceed {
                tracing::debug!(class = %state.class, "Operation declined on weak network");
                return Ok(None);
            }
        }

        Ok(Some(operation().await))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::state::NetworkClass;
    use crate::notify::RecordingNotifier;

    fn monitor(notifier: &Arc<RecordingNotifier>) -> NetworkMonitor {
        NetworkMonitor::new(notifier.clone())
    }

    #[test]
    fn test_transitions_and_recovery_toast() {
        let notifier = Arc::new(RecordingNotifier::new());
        let monitor = monitor(&notifier);
        assert!(monitor.is_online());

        assert_eq!(monitor.update(NetworkState::default()), None);
        assert_eq!(monitor.update(NetworkState::offline()), Some(Transition::WentOffline));
        assert!(notifier.toasts().is_empty());

        assert_eq!(
            monitor.update(NetworkState::online(NetworkClass::Wifi)),
            Some(Transition::Recovered)
        );
        assert_eq!(notifier.toasts(), vec!["Network connection restored".to_string()]);

        assert_eq!(
            monitor.update(NetworkState::online(NetworkClass::Cellular3g)),
            Some(Transition::ClassChanged)
        );
        assert_eq!(notifier.toasts().len(), 1);
    }

    #[test]
    fn test_offline_notice_resets_on_recovery() {
        let notifier = Arc::new(RecordingNotifier::new());
        let monitor = monitor(&notifier);
        monitor.update(NetworkState::offline());

        assert!(monitor.claim_offline_notice());
        assert!(!monitor.claim_offline_notice());

        monitor.update(NetworkState::online(NetworkClass::Wifi));
        monitor.update(NetworkState::offline());
        assert!(monitor.claim_offline_notice());
    }

    #[tokio::test]
    async fn test_subscribers_see_current_then_changes() {
        let notifier = Arc::new(RecordingNotifier::new());
        let monitor = monitor(&notifier);
        let mut rx = monitor.subscribe();

        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().connected);

        monitor.update(NetworkState::offline());
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_offline());
    }

    #[tokio::test]
    async fn test_check_and_execute() {
        let notifier = Arc::new(RecordingNotifier::answering(false));
        let monitor = monitor(&notifier);
        let weak = ExecuteOptions {
            confirm_on_weak_network: true,
        };

        monitor.update(NetworkState::online(NetworkClass::Wifi));
        assert!(matches!(monitor.check_and_execute(weak, || async { 7 }).await, Ok(Some(7))));

        monitor.update(NetworkState::online(NetworkClass::Cellular2g));
        assert!(matches!(monitor.check_and_execute(weak, || async { 7 }).await, Ok(None)));
        assert_eq!(notifier.confirmations().len(), 1);
        assert!(matches!(
            monitor
                .check_and_execute(ExecuteOptions::default(), || async { 7 })
                .await,
            Ok(Some(7))
        ));

        monitor.update(NetworkState::offline());
        let err = monitor
            .check_and_execute(ExecuteOptions::default(), || async { 7 })
            .await
            .unwrap_err();
        assert!(err.is_offline());
        assert!(notifier.modals()[0].blocking);
    }
}
