//! User-facing side effects of classified errors.
//!
//! # Responsibilities
//! - Log every handled error exactly once
//! - Pick the presentation: toast, permission modal, blocking modal,
//!   re-authentication, or silence
//! - Clear stored credentials on auth failures
//! - Suppress identical toasts fired in quick succession

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

use crate::auth::CredentialStore;
use crate::config::ErrorsConfig;
use crate::error::classify::{classify, Failure};
use crate::error::record::{ApiError, ErrorKind, Severity};
use crate::network::NetworkMonitor;
use crate::notify::{Modal, ModalAction, Notifier};
use crate::observability::metrics;

/// What the handler did with an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
    /// Logged only.
    Suppressed,
    Toast,
    /// Same text was toasted within the dedup window.
    DuplicateToast,
    /// Modal offering to open the system settings.
    PermissionModal,
    /// Blocking modal for fatal severity.
    FatalModal,
    /// Offline dialog with a retry action.
    OfflineModal,
    /// Credentials cleared (and a login redirect requested if configured).
    Reauthenticate,
}

/// Applies logging and UI side effects for classified errors.
pub struct ErrorHandler {
    notifier: Arc<dyn Notifier>,
    credentials: Arc<dyn CredentialStore>,
    network: Option<Arc<NetworkMonitor>>,
    redirect_on_auth_failure: bool,
    toast_dedup: Duration,
    last_toast: Mutex<Option<(String, Instant)>>,
}

impl ErrorHandler {
    pub fn new(
        notifier: Arc<dyn Notifier>,
        credentials: Arc<dyn CredentialStore>,
        config: &ErrorsConfig,
    ) -> Self {
        Self {
            notifier,
            credentials,
            network: None,
            redirect_on_auth_failure: config.redirect_on_auth_failure,
            toast_dedup: Duration::from_millis(config.toast_dedup_ms),
            last_toast: Mutex::new(None),
        }
    }

    /// Route offline dialogs through the monitor's "notice shown" guard.
    pub fn with_network(mut self, network: Arc<NetworkMonitor>) -> Self {
        self.network = Some(network);
        self
    }

    /// Generic entry point for failures raised outside the dispatcher.
    pub fn handle_failure(&self, failure: Failure, context: Option<&str>) -> ApiError {
        let mut err = classify(failure);
        if let Some(context) = context {
            err = err.with_context(context);
        }
        self.handle(&err);
        err
    }

    /// Log the error and present it.
    pub fn handle(&self, err: &ApiError) -> Reaction {
        metrics::record_error(err.kind.as_str());

        if err.is_cancelled() {
            tracing::debug!(context = ?err.context, "Request cancelled");
            return Reaction::Suppressed;
        }

        if err.is_backend_unavailable() {
            tracing::warn!(
                kind = %err.kind,
                status = ?err.status,
                context = ?err.context,
                message = %err.message,
                "Backend unavailable"
            );
            return Reaction::Suppressed;
        }

        tracing::error!(
            kind = %err.kind,
            code = ?err.code,
            status = ?err.status,
            context = ?err.context,
            cause = ?err.cause,
            message = %err.message,
            "Request failed"
        );

        match err.kind {
            ErrorKind::Auth => {
                if let Err(e) = self.credentials.clear_token() {
                    tracing::warn!(error = %e, "Failed to clear credentials");
                }
                if self.redirect_on_auth_failure {
                    self.notifier.redirect_to_login();
                }
                if err.severity == Severity::Fatal {
                    self.notifier.modal(Modal::blocking("Session ended", &err.user_message));
                }
                Reaction::Reauthenticate
            }
            ErrorKind::Permission => {
                self.notifier.modal(Modal {
                    title: "Permission required".to_string(),
                    message: err.user_message.clone(),
                    actions: vec![ModalAction::OpenSettings, ModalAction::Dismiss],
                    blocking: err.severity == Severity::Fatal,
                });
                Reaction::PermissionModal
            }
            _ if err.is_offline() => {
                let first_notice = self
                    .network
                    .as_ref()
                    .map_or(true, |monitor| monitor.claim_offline_notice());
                if !first_notice {
                    return Reaction::Suppressed;
                }
                self.notifier.modal(Modal {
                    title: "No network connection".to_string(),
                    message: err.user_message.clone(),
                    actions: vec![ModalAction::Retry, ModalAction::Dismiss],
                    blocking: false,
                });
                Reaction::OfflineModal
            }
            _ if err.severity == Severity::Fatal => {
                self.notifier.modal(Modal::blocking("Error", &err.user_message));
                Reaction::FatalModal
            }
            _ => self.toast(&err.user_message),
        }
    }

    fn toast(&self, text: &str) -> Reaction {
        let now = Instant::now();
        let mut last = match self.last_toast.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some((previous, at)) = last.as_ref() {
            if previous == text && now.duration_since(*at) < self.toast_dedup {
                return Reaction::DuplicateToast;
            }
        }
        *last = Some((text.to_string(), now));
        drop(last);

        self.notifier.toast(text);
        Reaction::Toast
    }
}
