//! Transport abstraction.
//!
//! # Data Flow
//! ```text
//! Dispatcher builds TransportRequest
//!     → abortable() pairs the whole call (retries, backoff, re-auth)
//!       with an AbortHandle held by the lifecycle registry
//!     → Transport::send (http.rs in production, scripted in tests)
//!     → TransportResponse | TransportError
//! ```
//!
//! # Design Decisions
//! - The transport only moves bytes; envelope parsing and classification
//!   happen in the dispatcher
//! - Cancellation is cooperative: aborting the handle drops the call future
//!   at its next suspension point, including a backoff sleep

pub mod http;

use async_trait::async_trait;
use futures_util::future::{AbortHandle, Abortable};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::PathBuf;
use thiserror::Error;

pub use http::ReqwestTransport;

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Head,
    Options,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    /// Methods whose responses may be cached.
    pub fn is_read_only(self) -> bool {
        matches!(self, Method::Get | Method::Head | Method::Options)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file upload sent as `multipart/form-data`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartUpload {
    pub file_path: PathBuf,
    /// Form field carrying the file.
    pub field: String,
    /// Additional text parts.
    pub fields: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(serde_json::Value),
    Multipart(MultipartUpload),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
}

impl TransportRequest {
    /// First header value matching `name` case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// Failures where no response was received.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The platform aborted the call (not the registry).
    #[error("request aborted by transport")]
    Aborted,

    /// The registry cancelled the call.
    #[error("request cancelled")]
    Cancelled,

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("request timed out")]
    Timeout,

    /// The request could not be built (bad URL, unreadable upload file).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl TransportError {
    /// Failures worth another attempt after backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransportError::Aborted | TransportError::Connection(_) | TransportError::Timeout
        )
    }
}

/// The black-box send capability.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

/// An abortable in-flight call as seen by the lifecycle registry.
pub trait TaskHandle: Send + Sync + std::fmt::Debug {
    fn abort(&self) -> Result<(), TransportError>;
}

impl TaskHandle for AbortHandle {
    fn abort(&self) -> Result<(), TransportError> {
        AbortHandle::abort(self);
        Ok(())
    }
}

/// Wrap a call so it can be aborted through the returned handle.
///
/// An aborted call resolves to the error built by `on_cancel`.
pub fn abortable<F, T, E>(
    call: F,
    on_cancel: impl FnOnce() -> E,
) -> (AbortHandle, impl Future<Output = Result<T, E>>)
where
    F: Future<Output = Result<T, E>>,
{
    let (handle, registration) = AbortHandle::new_pair();
    let call = Abortable::new(call, registration);
    let call = async move {
        match call.await {
            Ok(result) => result,
            Err(_aborted) => Err(on_cancel()),
        }
    };
    (handle, call)
}
