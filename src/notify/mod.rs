//! UI side-effect boundary.
//!
//! The core never renders anything itself. Toasts, dialogs, login redirects
//! and the loading indicator are requested through [`Notifier`], which the
//! host application implements on top of its UI toolkit.

use async_trait::async_trait;
use std::sync::Mutex;

/// Buttons a modal can offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalAction {
    Dismiss,
    Retry,
    OpenSettings,
}

/// A dialog request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Modal {
    pub title: String,
    pub message: String,
    pub actions: Vec<ModalAction>,
    /// The user must acknowledge before continuing.
    pub blocking: bool,
}

impl Modal {
    /// A blocking dialog with a single dismiss button.
    pub fn blocking(title: &str, message: &str) -> Self {
        Self {
            title: title.to_string(),
            message: message.to_string(),
            actions: vec![ModalAction::Dismiss],
            blocking: true,
        }
    }
}

/// Presentation hooks supplied by the host application.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn toast(&self, message: &str);

    fn modal(&self, modal: Modal);

    /// Ask the user to confirm; `true` means proceed.
    async fn confirm(&self, title: &str, message: &str) -> bool;

    fn redirect_to_login(&self);

    fn show_loading(&self, _label: &str) {}

    fn hide_loading(&self) {}
}

/// Headless notifier that writes every request to the log.
#[derive(Debug, Clone, Default)]
pub struct TracingNotifier {
    /// Answer given to `confirm` prompts.
    pub auto_confirm: bool,
}

#[async_trait]
impl Notifier for TracingNotifier {
    fn toast(&self, message: &str) {
        tracing::info!(message = %message, "toast");
    }

    fn modal(&self, modal: Modal) {
        tracing::info!(title = %modal.title, message = %modal.message, blocking = modal.blocking, "modal");
    }

    async fn confirm(&self, title: &str, message: &str) -> bool {
        tracing::info!(title = %title, message = %message, answer = self.auto_confirm, "confirm");
        self.auto_confirm
    }

    fn redirect_to_login(&self) {
        tracing::info!("redirect to login");
    }
}

/// In-memory notifier that records every request, for tests and headless
/// harnesses.
#[derive(Debug)]
pub struct RecordingNotifier {
    toasts: Mutex<Vec<String>>,
    modals: Mutex<Vec<Modal>>,
    confirmations: Mutex<Vec<String>>,
    redirects: Mutex<usize>,
    loading: Mutex<(usize, usize)>,
    confirm_answer: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::answering(true)
    }

    /// A notifier whose `confirm` prompts always return `answer`.
    pub fn answering(answer: bool) -> Self {
        Self {
            toasts: Mutex::new(Vec::new()),
            modals: Mutex::new(Vec::new()),
            confirmations: Mutex::new(Vec::new()),
            redirects: Mutex::new(0),
            loading: Mutex::new((0, 0)),
            confirm_answer: answer,
        }
    }

    pub fn toasts(&self) -> Vec<String> {
        lock(&self.toasts).clone()
    }

    pub fn modals(&self) -> Vec<Modal> {
        lock(&self.modals).clone()
    }

    pub fn confirmations(&self) -> Vec<String> {
        lock(&self.confirmations).clone()
    }

    pub fn login_redirects(&self) -> usize {
        *lock(&self.redirects)
    }

    /// `(shown, hidden)` counts for the loading indicator.
    pub fn loading_calls(&self) -> (usize, usize) {
        *lock(&self.loading)
    }
}

impl Default for RecordingNotifier {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn toast(&self, message: &str) {
        lock(&self.toasts).push(message.to_string());
    }

    fn modal(&self, modal: Modal) {
        lock(&self.modals).push(modal);
    }

    async fn confirm(&self, title: &str, _message: &str) -> bool {
        lock(&self.confirmations).push(title.to_string());
        self.confirm_answer
    }

    fn redirect_to_login(&self) {
        *lock(&self.redirects) += 1;
    }

    fn show_loading(&self, _label: &str) {
        lock(&self.loading).0 += 1;
    }

    fn hide_loading(&self) {
        lock(&self.loading).1 += 1;
    }
}
