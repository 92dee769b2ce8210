//! Active connectivity probing.
//!
//! # Responsibilities
//! - Periodically GET a lightweight endpoint through the transport
//! - Feed the result into the monitor (any response = online)
//!
//! Hosts that receive platform connectivity events push them into the
//! monitor directly and leave the probe disabled.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};

use crate::network::monitor::NetworkMonitor;
use crate::network::state::{NetworkClass, NetworkState};
use crate::transport::{Method, RequestBody, Transport, TransportRequest};

pub struct ConnectivityProbe {
    transport: Arc<dyn Transport>,
    monitor: Arc<NetworkMonitor>,
    url: String,
    interval: Duration,
    timeout: Duration,
}

impl ConnectivityProbe {
    pub fn new(
        transport: Arc<dyn Transport>,
        monitor: Arc<NetworkMonitor>,
        url: impl Into<String>,
        interval: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            monitor,
            url: url.into(),
            interval,
            timeout,
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            url = %self.url,
            "Connectivity probe starting"
        );

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Connectivity probe received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Probe once and update the monitor. Returns whether the endpoint answered.
    pub async fn check(&self) -> bool {
        let request = TransportRequest {
            method: Method::Get,
            url: self.url.clone(),
            headers: vec![("User-Agent".to_string(), "resilient-client-probe".to_string())],
            body: RequestBody::Empty,
        };

        let reachable = match time::timeout(self.timeout, self.transport.send(request)).await {
            Ok(Ok(_response)) => true,
            Ok(Err(e)) => {
                tracing::debug!(error = %e, "Connectivity probe failed");
                false
            }
            Err(_) => {
                tracing::debug!(timeout_secs = self.timeout.as_secs(), "Connectivity probe timed out");
                false
            }
        };

        let current = self.monitor.current();
        let next = if reachable {
            let class = match current.class {
                NetworkClass::None => NetworkClass::Unknown,
                class => class,
            };
            NetworkState::online(class)
        } else {
            NetworkState::offline()
        };
        self.monitor.update(next);
        reachable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::RecordingNotifier;
    use crate::transport::{TransportError, TransportResponse};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Toggle {
        up: AtomicBool,
    }

    #[async_trait]
    impl Transport for Toggle {
        async fn send(
            &self,
            _request: TransportRequest,
        ) -> Result<TransportResponse, TransportError> {
            if self.up.load(Ordering::SeqCst) {
                Ok(TransportResponse {
                    status: 204,
                    body: String::new(),
                })
            } else {
                Err(TransportError::Connection("connection refused".into()))
            }
        }
    }

    #[tokio::test]
    async fn test_probe_drives_monitor() {
        let notifier = Arc::new(RecordingNotifier::new());
        let monitor = Arc::new(NetworkMonitor::new(notifier.clone()));
        let transport = Arc::new(Toggle {
            up: AtomicBool::new(false),
        });
        let probe = ConnectivityProbe::new(
            transport.clone(),
            monitor.clone(),
            "http://127.0.0.1/health",
            Duration::from_secs(15),
            Duration::from_secs(5),
        );

        assert!(!probe.check().await);
        assert!(!monitor.is_online());

        transport.up.store(true, Ordering::SeqCst);
        assert!(probe.check().await);
        assert!(monitor.is_online());
        assert_eq!(notifier.toasts(), vec!["Network connection restored".to_string()]);
    }
}
