//! Single-flight token refresh.
//!
//! All callers that find the token missing or near expiry while a refresh is
//! running await the same shared future. The slot is tagged with a generation
//! so a finished flight is only cleared by its own participants.

use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::auth::credentials::{CredentialStore, TokenSet};
use crate::auth::refresher::TokenRefresher;
use crate::error::{ApiError, ErrorKind};
use crate::observability::metrics;

type RefreshFlight = Shared<BoxFuture<'static, Result<TokenSet, ApiError>>>;

/// Keeps the stored access token valid.
pub struct TokenCoordinator {
    store: Arc<dyn CredentialStore>,
    refresher: Arc<dyn TokenRefresher>,
    threshold: Duration,
    pending: Mutex<Option<(u64, RefreshFlight)>>,
    generation: AtomicU64,
}

impl TokenCoordinator {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        refresher: Arc<dyn TokenRefresher>,
        threshold: Duration,
    ) -> Self {
        Self {
            store,
            refresher,
            threshold,
            pending: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// Return a usable access token, refreshing first if it is missing or
    /// expires within the threshold.
    pub async fn ensure_valid(&self) -> Result<String, ApiError> {
        match self.store.get_token() {
            None => Err(ApiError::auth("no stored credentials")),
            Some(tokens) if !tokens.expires_within(self.threshold) => Ok(tokens.access_token),
            // Still valid but nothing to renew it with
            Some(tokens) if tokens.refresh_token.is_none() && !tokens.remaining().is_zero() => {
                Ok(tokens.access_token)
            }
            Some(_) => self.refresh().await.map(|tokens| tokens.access_token),
        }
    }

    /// Called after the server rejected `rejected` as expired.
    ///
    /// If another caller already replaced that token, the replacement is
    /// returned without a second refresh.
    pub async fn renew_after_rejection(&self, rejected: &str) -> Result<String, ApiError> {
        if let Some(tokens) = self.store.get_token() {
            if tokens.access_token != rejected && !tokens.expires_within(self.threshold) {
                return Ok(tokens.access_token);
            }
        }
        self.refresh().await.map(|tokens| tokens.access_token)
    }

    /// Join the running refresh, or start one.
    pub async fn refresh(&self) -> Result<TokenSet, ApiError> {
        let (generation, flight) = {
            let mut slot = self.pending.lock().await;
            match slot.as_ref() {
                Some((generation, flight)) => {
                    tracing::debug!(generation, "Joining in-flight token refresh");
                    (*generation, flight.clone())
                }
                None => {
                    let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
                    let flight = run_refresh(self.store.clone(), self.refresher.clone())
                        .boxed()
                        .shared();
                    *slot = Some((generation, flight.clone()));
                    (generation, flight)
                }
            }
        };

        let result = flight.await;

        let mut slot = self.pending.lock().await;
        if matches!(slot.as_ref(), Some((current, _)) if *current == generation) {
            *slot = None;
        }
        result
    }

    /// Drop stored credentials.
    pub fn invalidate(&self) {
        if let Err(e) = self.store.clear_token() {
            tracing::warn!(error = %e, "Failed to clear stored credentials");
        }
    }
}

async fn run_refresh(
    store: Arc<dyn CredentialStore>,
    refresher: Arc<dyn TokenRefresher>,
) -> Result<TokenSet, ApiError> {
    let Some(refresh_token) = store.get_token().and_then(|tokens| tokens.refresh_token) else {
        clear(&store);
        metrics::record_token_refresh("missing");
        return Err(ApiError::auth("no refresh token available"));
    };

    tracing::info!("Refreshing access token");

    match refresher.refresh(&refresh_token).await {
        Ok(mut tokens) => {
            if tokens.refresh_token.is_none() {
                tokens.refresh_token = Some(refresh_token);
            }
            if let Err(e) = store.set_token(tokens.clone()) {
                tracing::warn!(error = %e, "Refreshed token could not be persisted");
            }
            metrics::record_token_refresh("success");
            tracing::info!(expires_at = tokens.expires_at, "Access token refreshed");
            Ok(tokens)
        }
        Err(err) => {
            clear(&store);
            metrics::record_token_refresh("failure");
            tracing::warn!(error = %err, "Token refresh failed; credentials cleared");
            Err(if err.kind == ErrorKind::Auth {
                err
            } else {
                ApiError::auth("token refresh failed").with_cause(err.to_string())
            })
        }
    }
}

fn clear(store: &Arc<dyn CredentialStore>) {
    if let Err(e) = store.clear_token() {
        tracing::warn!(error = %e, "Failed to clear stored credentials");
    }
}
