//! Dispatcher assembly.

use arc_swap::ArcSwapOption;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{
    CredentialError, CredentialStore, FileCredentialStore, HttpTokenRefresher,
    MemoryCredentialStore, TokenCoordinator, TokenRefresher,
};
use crate::cache::CacheStore;
use crate::config::ClientConfig;
use crate::dispatch::dispatcher::{join_url, Dispatcher, Inner};
use crate::error::ErrorHandler;
use crate::lifecycle::{Debouncer, RequestRegistry, Throttler};
use crate::network::NetworkMonitor;
use crate::notify::{Notifier, TracingNotifier};
use crate::transport::Transport;

/// Wires the subsystems together. Every collaborator has a default; tests and
/// hosts override the ones they care about.
pub struct DispatcherBuilder {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    credentials: Option<Arc<dyn CredentialStore>>,
    refresher: Option<Arc<dyn TokenRefresher>>,
    notifier: Option<Arc<dyn Notifier>>,
    network: Option<Arc<NetworkMonitor>>,
    cache: Option<CacheStore>,
}

impl Dispatcher {
    pub fn builder(config: ClientConfig, transport: Arc<dyn Transport>) -> DispatcherBuilder {
        DispatcherBuilder {
            config,
            transport,
            credentials: None,
            refresher: None,
            notifier: None,
            network: None,
            cache: None,
        }
    }
}

impl DispatcherBuilder {
    pub fn credentials(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.credentials = Some(store);
        self
    }

    pub fn refresher(mut self, refresher: Arc<dyn TokenRefresher>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn network(mut self, monitor: Arc<NetworkMonitor>) -> Self {
        self.network = Some(monitor);
        self
    }

    /// Share a cache with another dispatcher.
    pub fn cache(mut self, cache: CacheStore) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Fails only when a configured credentials file cannot be read.
    pub fn build(self) -> Result<Dispatcher, CredentialError> {
        let config = self.config;

        let credentials: Arc<dyn CredentialStore> = match (self.credentials, &config.auth.credentials_path) {
            (Some(store), _) => store,
            (None, Some(path)) => Arc::new(FileCredentialStore::open(path)?),
            (None, None) => Arc::new(MemoryCredentialStore::new()),
        };

        let refresher = self.refresher.unwrap_or_else(|| {
            Arc::new(HttpTokenRefresher::new(
                self.transport.clone(),
                join_url(&config.api.base_url, &config.auth.refresh_path),
                config.envelope,
                config.api.envelope_header_pair(),
            ))
        });

        let notifier = self
            .notifier
            .unwrap_or_else(|| Arc::new(TracingNotifier::default()));

        let network = self
            .network
            .unwrap_or_else(|| Arc::new(NetworkMonitor::new(notifier.clone())));

        let tokens = Arc::new(TokenCoordinator::new(
            credentials.clone(),
            refresher,
            Duration::from_secs(config.auth.refresh_threshold_secs),
        ));

        let errors = ErrorHandler::new(notifier.clone(), credentials, &config.errors)
            .with_network(network.clone());

        tracing::debug!(base_url = %config.api.base_url, "Dispatcher assembled");

        Ok(Dispatcher::from_inner(Inner {
            transport: self.transport,
            cache: self.cache.unwrap_or_default(),
            registry: Arc::new(RequestRegistry::new()),
            tokens,
            network,
            errors,
            notifier,
            location: ArcSwapOption::empty(),
            revalidating: DashMap::new(),
            debouncer: Debouncer::new(),
            throttler: Throttler::new(),
            config,
        }))
    }
}
