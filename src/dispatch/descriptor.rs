//! Per-call request description.

use serde_json::Value;
use std::time::Duration;

use crate::cache::cache_key;
use crate::resilience::RetryPolicy;
use crate::transport::{Method, MultipartUpload};

/// Everything the dispatcher needs to run one call.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    /// Absolute URL, or a path joined onto the configured base URL.
    pub url: String,
    pub method: Method,
    pub body: Option<Value>,
    /// Query parameters; also part of the cache key.
    pub params: Option<Value>,
    /// Cache the decoded payload for this long (read-only methods only).
    pub cache_ttl: Option<Duration>,
    /// Retry transport failures with backoff.
    pub retry: Option<RetryPolicy>,
    pub skip_auth: bool,
    /// Tag for bulk cancellation (usually the owning screen).
    pub context: Option<String>,
    /// Registry id; a random one is generated when unset.
    pub id: Option<String>,
    pub show_loading: bool,
    /// Run the error handler's UI side effects on failure.
    pub report_errors: bool,
    pub headers: Vec<(String, String)>,
    pub(crate) upload: Option<MultipartUpload>,
}

impl RequestDescriptor {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method,
            body: None,
            params: None,
            cache_ttl: None,
            retry: None,
            skip_auth: false,
            context: None,
            id: None,
            show_loading: false,
            report_errors: true,
            headers: Vec::new(),
            upload: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn post(url: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Post, url).with_body(body)
    }

    pub fn put(url: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Put, url).with_body(body)
    }

    pub fn patch(url: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Patch, url).with_body(body)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::Delete, url)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }

    pub fn cached(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    pub fn skip_auth(mut self) -> Self {
        self.skip_auth = true;
        self
    }

    pub fn in_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_loading(mut self) -> Self {
        self.show_loading = true;
        self
    }

    /// Return errors to the caller without toasts or dialogs.
    pub fn silent(mut self) -> Self {
        self.report_errors = false;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// True when the response may be served from and stored in the cache.
    pub fn caches(&self) -> bool {
        self.cache_ttl.is_some() && self.method.is_read_only() && self.upload.is_none()
    }

    pub fn cache_key(&self) -> String {
        cache_key(&self.url, self.params.as_ref())
    }

    pub fn is_upload(&self) -> bool {
        self.upload.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_only_read_only_methods_cache() {
        let ttl = Duration::from_secs(60);
        assert!(RequestDescriptor::get("/v1/users/me").cached(ttl).caches());
        assert!(!RequestDescriptor::get("/v1/users/me").caches());
        assert!(!RequestDescriptor::post("/v1/orders", json!({})).cached(ttl).caches());
    }

    #[test]
    fn test_defaults() {
        let descriptor = RequestDescriptor::get("/v1/feed")
            .with_params(json!({"page": 2}))
            .in_context("feed");
        assert!(descriptor.report_errors);
        assert!(!descriptor.skip_auth);
        assert_eq!(descriptor.cache_key(), r#"/v1/feed#{"page":2}"#);
        assert!(!descriptor.silent().report_errors);
    }
}
