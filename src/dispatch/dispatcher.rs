//! The request dispatcher.
//!
//! ```text
//! IDLE → CACHE_CHECK ─ hit ─────────────────────────────→ return (maybe revalidate)
//!            └ miss → OFFLINE? → TOKEN_CHECK → TRANSPORT → PARSE
//!                                                 ↑ backoff   ├ data ──→ cache, return
//!                                                 └───────────┤ expired → refresh once → TRANSPORT
//!                                                             └ error ─→ classify, report
//! ```
//!
//! Everything from TOKEN_CHECK onward runs under one registry entry.

use arc_swap::ArcSwapOption;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use url::Url;
use uuid::Uuid;

use crate::auth::TokenCoordinator;
use crate::cache::CacheStore;
use crate::config::{ClientConfig, EnvelopeConfig};
use crate::dispatch::descriptor::RequestDescriptor;
use crate::dispatch::envelope::{interpret, Reply};
use crate::error::{classify, ApiError, ErrorHandler, Failure};
use crate::lifecycle::{
    CachePurger, Debouncer, RequestRegistry, Shutdown, StaleTaskSweeper, Throttler,
};
use crate::network::{ConnectivityProbe, NetworkMonitor, NetworkState};
use crate::notify::Notifier;
use crate::observability::metrics;
use crate::resilience::retry_with_backoff;
use crate::transport::{
    abortable, Method, MultipartUpload, RequestBody, Transport, TransportError,
    TransportRequest, TransportResponse,
};

/// Coarse device location sent as request headers when set.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationHint {
    pub latitude: f64,
    pub longitude: f64,
    pub city: Option<String>,
}

pub(crate) struct Inner {
    pub(crate) config: ClientConfig,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) cache: CacheStore,
    pub(crate) registry: Arc<RequestRegistry>,
    pub(crate) tokens: Arc<TokenCoordinator>,
    pub(crate) network: Arc<NetworkMonitor>,
    pub(crate) errors: ErrorHandler,
    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) location: ArcSwapOption<LocationHint>,
    pub(crate) revalidating: DashMap<String, ()>,
    pub(crate) debouncer: Debouncer,
    pub(crate) throttler: Throttler,
}

/// One call contract over cache, auth, registry, network and error handling.
///
/// Cheap to clone; clones share every subsystem.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

/// Hides the loading indicator on every exit path.
struct LoadingGuard {
    notifier: Arc<dyn Notifier>,
}

impl LoadingGuard {
    fn show(notifier: &Arc<dyn Notifier>, label: &str) -> Self {
        notifier.show_loading(label);
        Self {
            notifier: notifier.clone(),
        }
    }
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.notifier.hide_loading();
    }
}

/// Drops the revalidation marker even if the refresh task is aborted.
struct RevalidationGuard {
    inner: Arc<Inner>,
    key: String,
}

impl Drop for RevalidationGuard {
    fn drop(&mut self) {
        self.inner.revalidating.remove(&self.key);
    }
}

impl Dispatcher {
    pub(crate) fn from_inner(inner: Inner) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Run one call and return the envelope's `data`.
    pub async fn dispatch(&self, descriptor: RequestDescriptor) -> Result<Value, ApiError> {
        let started = Instant::now();
        let _loading = descriptor
            .show_loading
            .then(|| LoadingGuard::show(&self.inner.notifier, &descriptor.url));

        let result = self.run(&descriptor).await;

        let outcome = match &result {
            Ok(_) => "ok",
            Err(err) => err.kind.as_str(),
        };
        metrics::record_request(descriptor.method.as_str(), outcome, started.elapsed());

        result.map_err(|err| self.report(err, &descriptor))
    }

    /// Same as [`Dispatcher::dispatch`].
    pub async fn request(&self, descriptor: RequestDescriptor) -> Result<Value, ApiError> {
        self.dispatch(descriptor).await
    }

    /// Dispatch and decode `data` into `T`. A decode failure is a validation error.
    pub async fn dispatch_as<T: DeserializeOwned>(
        &self,
        descriptor: RequestDescriptor,
    ) -> Result<T, ApiError> {
        let report_errors = descriptor.report_errors;
        let context = descriptor.context.clone().unwrap_or_else(|| descriptor.url.clone());
        let data = self.dispatch(descriptor).await?;
        serde_json::from_value(data).map_err(|e| {
            let err = classify(Failure::from(e)).with_context(context);
            if report_errors {
                self.inner.errors.handle(&err);
            }
            err
        })
    }

    /// Send a file as `multipart/form-data` through the normal auth and
    /// error path. Uploads are never cached or retried.
    pub async fn upload_file(
        &self,
        file_path: impl Into<PathBuf>,
        url: impl Into<String>,
        field: impl Into<String>,
        extra_fields: Vec<(String, String)>,
    ) -> Result<Value, ApiError> {
        let mut descriptor = RequestDescriptor::new(Method::Post, url);
        descriptor.upload = Some(MultipartUpload {
            file_path: file_path.into(),
            field: field.into(),
            fields: extra_fields,
        });
        self.dispatch(descriptor).await
    }

    /// Like [`Dispatcher::upload_file`] with caller-supplied options
    /// (context, id, loading indicator, headers).
    pub async fn upload_with(
        &self,
        mut descriptor: RequestDescriptor,
        upload: MultipartUpload,
    ) -> Result<Value, ApiError> {
        descriptor.method = Method::Post;
        descriptor.body = None;
        descriptor.retry = None;
        descriptor.cache_ttl = None;
        descriptor.upload = Some(upload);
        self.dispatch(descriptor).await
    }

    pub fn cancel(&self, id: &str) -> bool {
        self.inner.registry.cancel(id)
    }

    pub fn cancel_by_context(&self, context: &str) -> usize {
        self.inner.registry.cancel_by_context(context)
    }

    pub fn cancel_all(&self) -> usize {
        self.inner.registry.cancel_all()
    }

    /// Postpone `action` until `delay` passes without another call for `key`.
    pub fn debounce<F, Fut>(&self, key: impl Into<String>, delay: Duration, action: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.inner.debouncer.debounce(key, delay, action);
    }

    /// Run `action` at most once per `interval` for `key`.
    pub fn throttle<R>(
        &self,
        key: impl Into<String>,
        interval: Duration,
        action: impl FnOnce() -> R,
    ) -> Option<R> {
        self.inner.throttler.throttle(key, interval, action)
    }

    pub fn subscribe_network(&self) -> watch::Receiver<NetworkState> {
        self.inner.network.subscribe()
    }

    /// Classify and report a failure that happened outside `dispatch`.
    pub fn handle_error(&self, failure: Failure, context: Option<&str>) -> ApiError {
        self.inner.errors.handle_failure(failure, context)
    }

    pub fn set_location_hint(&self, hint: Option<LocationHint>) {
        self.inner.location.store(hint.map(Arc::new));
    }

    pub fn cache(&self) -> &CacheStore {
        &self.inner.cache
    }

    pub fn registry(&self) -> &Arc<RequestRegistry> {
        &self.inner.registry
    }

    pub fn network(&self) -> &Arc<NetworkMonitor> {
        &self.inner.network
    }

    pub fn tokens(&self) -> &Arc<TokenCoordinator> {
        &self.inner.tokens
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Spawn the stale-task sweeper, cache purger and (if enabled) the
    /// connectivity probe. They stop when `shutdown` fires.
    pub fn start_maintenance(&self, shutdown: &Shutdown) -> Vec<JoinHandle<()>> {
        let config = &self.inner.config;
        let mut tasks = vec![
            tokio::spawn(
                StaleTaskSweeper::new(
                    self.inner.registry.clone(),
                    Duration::from_secs(config.lifecycle.stale_task_secs),
                    Duration::from_secs(config.lifecycle.sweep_interval_secs),
                )
                .run(shutdown.subscribe()),
            ),
            tokio::spawn(
                CachePurger::new(
                    self.inner.cache.clone(),
                    Duration::from_secs(config.cache.purge_interval_secs),
                )
                .run(shutdown.subscribe()),
            ),
        ];

        if config.network.probe_enabled {
            let probe = ConnectivityProbe::new(
                self.inner.transport.clone(),
                self.inner.network.clone(),
                join_url(&config.api.base_url, &config.network.probe_url),
                Duration::from_secs(config.network.probe_interval_secs),
                Duration::from_secs(config.network.probe_timeout_secs),
            );
            tasks.push(tokio::spawn(probe.run(shutdown.subscribe())));
        }
        tasks
    }

    fn report(&self, err: ApiError, descriptor: &RequestDescriptor) -> ApiError {
        let context = descriptor
            .context
            .clone()
            .unwrap_or_else(|| descriptor.url.clone());
        let err = err.with_context(context);
        if descriptor.report_errors {
            self.inner.errors.handle(&err);
        } else {
            tracing::debug!(error = %err, "Request failed (not reported)");
        }
        err
    }

    async fn run(&self, descriptor: &RequestDescriptor) -> Result<Value, ApiError> {
        let caches = descriptor.caches();

        if caches {
            let key = descriptor.cache_key();
            if let Some(hit) = self.inner.cache.get(&key) {
                tracing::debug!(
                    url = %descriptor.url,
                    age_ms = hit.age.as_millis() as u64,
                    "Served from cache"
                );
                if hit.needs_revalidation() {
                    self.spawn_revalidation(key, descriptor);
                }
                return Ok(hit.value);
            }
        }

        if !self.inner.network.is_online() {
            tracing::debug!(url = %descriptor.url, "Offline; request not sent");
            return Err(ApiError::offline());
        }

        let id = descriptor
            .id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let data = self.fetch_tracked(descriptor, &id).await?;

        if let (true, Some(ttl)) = (caches, descriptor.cache_ttl) {
            self.inner.cache.set(descriptor.cache_key(), data.clone(), ttl);
        }
        Ok(data)
    }

    /// Refresh a stale cache slot in the background; at most one per key.
    fn spawn_revalidation(&self, key: String, descriptor: &RequestDescriptor) {
        if self.inner.revalidating.insert(key.clone(), ()).is_some() {
            return;
        }

        let this = self.clone();
        let mut descriptor = descriptor.clone();
        descriptor.id = None;
        descriptor.show_loading = false;
        descriptor.report_errors = false;

        tokio::spawn(async move {
            let _marker = RevalidationGuard {
                inner: this.inner.clone(),
                key: key.clone(),
            };
            if !this.inner.network.is_online() {
                return;
            }
            let id = Uuid::new_v4().to_string();
            match this.fetch_tracked(&descriptor, &id).await {
                Ok(data) => {
                    if let Some(ttl) = descriptor.cache_ttl {
                        this.inner.cache.set(key, data, ttl);
                    }
                    tracing::debug!(url = %descriptor.url, "Background revalidation stored");
                }
                Err(err) => {
                    tracing::debug!(url = %descriptor.url, error = %err, "Background revalidation failed");
                }
            }
        });
    }

    /// Run `fetch` under a single registry entry.
    ///
    /// The entry covers every attempt, backoff sleep and token refresh, so a
    /// cancel, a newer call with the same id, or the stale sweep ends the call
    /// wherever it is suspended.
    async fn fetch_tracked(&self, descriptor: &RequestDescriptor, id: &str) -> Result<Value, ApiError> {
        let (handle, call) = abortable(self.fetch(descriptor, id), ApiError::cancelled);
        let _guard = self
            .inner
            .registry
            .register(id, Box::new(handle), descriptor.context.clone());
        call.await
    }

    /// Token check, transmit, parse; one auth retry at most.
    async fn fetch(&self, descriptor: &RequestDescriptor, id: &str) -> Result<Value, ApiError> {
        let mut token = if descriptor.skip_auth {
            None
        } else {
            Some(self.inner.tokens.ensure_valid().await?)
        };
        let mut auth_retried = false;

        loop {
            let response = self.transmit(descriptor, id, token.as_deref()).await?;

            match interpret(&response, &self.envelope()) {
                Reply::Data(data) => return Ok(data),
                Reply::Failed(err) => return Err(err),
                Reply::TokenExpired => {
                    let Some(rejected) = token.clone() else {
                        return Err(ApiError::auth("server requires authentication")
                            .with_status(response.status));
                    };
                    if auth_retried {
                        self.inner.tokens.invalidate();
                        return Err(ApiError::auth("access token rejected again after refresh")
                            .with_status(response.status));
                    }
                    auth_retried = true;
                    tracing::info!(request_id = %id, url = %descriptor.url, "Access token expired; refreshing and retrying once");
                    token = Some(self.inner.tokens.renew_after_rejection(&rejected).await?);
                }
            }
        }
    }

    async fn transmit(
        &self,
        descriptor: &RequestDescriptor,
        id: &str,
        token: Option<&str>,
    ) -> Result<TransportResponse, ApiError> {
        let request = self.build_request(descriptor, id, token)?;

        let result = match (&descriptor.retry, descriptor.is_upload()) {
            (Some(policy), false) => {
                retry_with_backoff(policy, TransportError::is_retryable, |attempt| {
                    self.send_once(id, request.clone(), attempt)
                })
                .await
            }
            _ => self.send_once(id, request, 0).await,
        };

        result.map_err(|e| classify(Failure::Transport(e)))
    }

    async fn send_once(
        &self,
        id: &str,
        request: TransportRequest,
        attempt: u32,
    ) -> Result<TransportResponse, TransportError> {
        tracing::debug!(
            request_id = %id,
            method = %request.method,
            url = %request.url,
            attempt,
            "Dispatching request"
        );

        let result = self.inner.transport.send(request).await;
        if let Ok(response) = &result {
            tracing::debug!(request_id = %id, status = response.status, "Response received");
        }
        result
    }

    fn build_request(
        &self,
        descriptor: &RequestDescriptor,
        id: &str,
        token: Option<&str>,
    ) -> Result<TransportRequest, ApiError> {
        let url = self.resolve_url(&descriptor.url, descriptor.params.as_ref())?;
        let api = &self.inner.config.api;

        let mut headers = Vec::with_capacity(6 + descriptor.headers.len());
        if !descriptor.is_upload() {
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
        }
        if let Some(token) = token {
            headers.push(("Authorization".to_string(), format!("Bearer {token}")));
        }
        headers.push(api.envelope_header_pair());
        headers.push(("X-Request-Id".to_string(), id.to_string()));
        if let Some(hint) = self.inner.location.load_full() {
            headers.push(("X-Geo-Lat".to_string(), hint.latitude.to_string()));
            headers.push(("X-Geo-Lng".to_string(), hint.longitude.to_string()));
            if let Some(city) = &hint.city {
                headers.push(("X-Geo-City".to_string(), city.clone()));
            }
        }
        headers.extend(descriptor.headers.iter().cloned());

        let body = match (&descriptor.upload, &descriptor.body) {
            (Some(upload), _) => RequestBody::Multipart(upload.clone()),
            (None, Some(body)) => RequestBody::Json(body.clone()),
            (None, None) => RequestBody::Empty,
        };

        Ok(TransportRequest {
            method: descriptor.method,
            url,
            headers,
            body,
        })
    }

    fn resolve_url(&self, path: &str, params: Option<&Value>) -> Result<String, ApiError> {
        let full = join_url(&self.inner.config.api.base_url, path);
        let mut url = Url::parse(&full)
            .map_err(|e| ApiError::validation(format!("invalid request url `{full}`: {e}")))?;

        match params {
            Some(Value::Object(map)) if !map.is_empty() => {
                let mut pairs = url.query_pairs_mut();
                for (key, value) in map {
                    match value {
                        Value::Null => {}
                        Value::String(text) => {
                            pairs.append_pair(key, text);
                        }
                        other => {
                            pairs.append_pair(key, &other.to_string());
                        }
                    }
                }
            }
            Some(Value::Object(_)) | Some(Value::Null) | None => {}
            Some(other) => {
                tracing::debug!(params = %other, "Ignoring non-object query params");
            }
        }
        Ok(url.to_string())
    }

    fn envelope(&self) -> EnvelopeConfig {
        self.inner.config.envelope
    }
}

/// Join a path onto a base URL unless it is already absolute.
pub fn join_url(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
