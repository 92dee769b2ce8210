//! The normalized error record.

use serde::Serialize;
use thiserror::Error;

use crate::clock::unix_millis;

/// Error taxonomy shared by every subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Connectivity, transport or gateway failure.
    Network,
    /// Expired, invalid or unrefreshable credentials.
    Auth,
    /// A missing platform or account grant.
    Permission,
    /// Malformed input or undecodable payload.
    Validation,
    /// The backend rejected the request on domain grounds.
    Business,
    /// Anything that matched no other rule.
    Unknown,
}

impl ErrorKind {
    /// Message shown when nothing more specific is available.
    pub fn default_user_message(self) -> &'static str {
        match self {
            ErrorKind::Network => "Network unavailable. Check your connection and try again.",
            ErrorKind::Auth => "Your session has expired. Please sign in again.",
            ErrorKind::Permission => {
                "Permission is required to continue. You can grant it in Settings."
            }
            ErrorKind::Validation => "Some of the information provided is invalid.",
            ErrorKind::Business => "The request could not be completed.",
            ErrorKind::Unknown => "Something went wrong. Please try again later.",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Network => "network",
            ErrorKind::Auth => "auth",
            ErrorKind::Permission => "permission",
            ErrorKind::Validation => "validation",
            ErrorKind::Business => "business",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How loudly an error should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    Normal,
    /// Presented as a blocking modal instead of a toast.
    Fatal,
}

/// Special-case markers that change how an error is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorTag {
    /// Gateway/proxy failure. Logged only, never shown.
    BackendUnavailable,
    /// The request was cancelled through the lifecycle registry.
    Cancelled,
    /// The request was refused locally because the device is offline.
    Offline,
}

/// A classified failure.
#[derive(Debug, Clone, Error, Serialize)]
#[error("{kind} error: {message}")]
pub struct ApiError {
    pub kind: ErrorKind,
    /// Technical diagnostic text (logs only).
    pub message: String,
    /// Text safe to show to the user.
    pub user_message: String,
    /// Business code from the response envelope, if any.
    pub code: Option<i64>,
    /// HTTP status, if a response was received.
    pub status: Option<u16>,
    pub cause: Option<String>,
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
    /// Caller-supplied context (usually the request URL or context tag).
    pub context: Option<String>,
    pub severity: Severity,
    pub tag: Option<ErrorTag>,
}

impl ApiError {
    /// Create a record with the kind's default user message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            user_message: kind.default_user_message().to_string(),
            code: None,
            status: None,
            cause: None,
            timestamp_ms: unix_millis(),
            context: None,
            severity: Severity::Normal,
            tag: None,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Auth, message)
    }

    pub fn permission(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Permission, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, message)
    }

    /// Business rejection carrying the server's own message for the user.
    pub fn business(code: i64, server_message: &str) -> Self {
        Self::new(
            ErrorKind::Business,
            format!("business code {code}: {server_message}"),
        )
        .with_code(code)
        .with_user_message(server_message)
    }

    /// Refused locally because the device has no connectivity.
    pub fn offline() -> Self {
        Self::network("request blocked: device is offline")
            .with_user_message("You are offline. Reconnect and tap retry.")
            .with_tag(ErrorTag::Offline)
    }

    /// Aborted through the lifecycle registry.
    pub fn cancelled() -> Self {
        Self::network("request cancelled before completion").with_tag(ErrorTag::Cancelled)
    }

    /// Gateway/proxy failure; never surfaced to the user.
    pub fn backend_unavailable(message: impl Into<String>) -> Self {
        Self::network(message)
            .with_user_message("The service is temporarily unavailable.")
            .with_tag(ErrorTag::BackendUnavailable)
    }

    /// Replace the user-facing message.
    ///
    /// Blank text, or text identical to the technical message, falls back to
    /// the kind's default so the two never coincide.
    pub fn with_user_message(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        let text = text.trim();
        self.user_message = if text.is_empty() || text == self.message {
            self.kind.default_user_message().to_string()
        } else {
            text.to_string()
        };
        self
    }

    pub fn with_code(mut self, code: i64) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// Attach context unless some was already recorded closer to the failure.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        if self.context.is_none() {
            self.context = Some(context.into());
        }
        self
    }

    pub fn with_tag(mut self, tag: ErrorTag) -> Self {
        self.tag = Some(tag);
        self
    }

    pub fn fatal(mut self) -> Self {
        self.severity = Severity::Fatal;
        self
    }

    pub fn is_backend_unavailable(&self) -> bool {
        self.tag == Some(ErrorTag::BackendUnavailable)
    }

    pub fn is_cancelled(&self) -> bool {
        self.tag == Some(ErrorTag::Cancelled)
    }

    pub fn is_offline(&self) -> bool {
        self.tag == Some(ErrorTag::Offline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_never_equals_technical() {
        let err = ApiError::validation("phone is malformed").with_user_message("phone is malformed");
        assert_ne!(err.user_message, err.message);
        assert_eq!(err.user_message, ErrorKind::Validation.default_user_message());

        let err = ApiError::unknown("boom").with_user_message("   ");
        assert_eq!(err.user_message, ErrorKind::Unknown.default_user_message());
    }

    #[test]
    fn test_business_keeps_server_message_for_user() {
        let err = ApiError::business(4001, "Coupon already used");
        assert_eq!(err.kind, ErrorKind::Business);
        assert_eq!(err.code, Some(4001));
        assert_eq!(err.user_message, "Coupon already used");
        assert_eq!(err.message, "business code 4001: Coupon already used");
    }

    #[test]
    fn test_context_is_first_writer_wins() {
        let err = ApiError::network("reset").with_context("/v1/orders").with_context("/other");
        assert_eq!(err.context.as_deref(), Some("/v1/orders"));
    }

    #[test]
    fn test_error_display() {
        let err = ApiError::auth("refresh token rejected");
        assert_eq!(err.to_string(), "auth error: refresh token rejected");
    }

    #[test]
    fn test_tags() {
        assert!(ApiError::offline().is_offline());
        assert!(ApiError::cancelled().is_cancelled());
        let err = ApiError::backend_unavailable("502 from edge");
        assert!(err.is_backend_unavailable());
        assert_eq!(err.kind, ErrorKind::Network);
    }
}
