//! Shared utilities for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use resilient_client::auth::{MemoryCredentialStore, TokenRefresher, TokenSet};
use resilient_client::notify::RecordingNotifier;
use resilient_client::transport::{Transport, TransportError, TransportRequest, TransportResponse};
use resilient_client::{ApiError, ClientConfig, Dispatcher};

/// One scripted transport outcome.
#[derive(Debug, Clone)]
pub enum Step {
    Respond(u16, String),
    /// Respond after the given delay.
    Delayed(Duration, u16, String),
    Fail(TransportError),
    /// Never completes; only cancellation ends it.
    Hang,
}

/// Transport that replays scripted steps per URL path. The last step of a
/// script repeats once the earlier ones are used up.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<String, VecDeque<Step>>>,
    requests: Mutex<Vec<TransportRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, path: &str, steps: Vec<Step>) {
        self.routes
            .lock()
            .unwrap()
            .insert(path.to_string(), steps.into_iter().collect());
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls_to(&self, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|request| path_of(&request.url) == path)
            .count()
    }

    fn next_step(&self, path: &str) -> Option<Step> {
        let mut routes = self.routes.lock().unwrap();
        let queue = routes.get_mut(path)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

pub fn path_of(url: &str) -> String {
    url::Url::parse(url)
        .map(|url| url.path().to_string())
        .unwrap_or_else(|_| url.to_string())
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let path = path_of(&request.url);
        self.requests.lock().unwrap().push(request);

        match self.next_step(&path) {
            Some(Step::Respond(status, body)) => Ok(TransportResponse { status, body }),
            Some(Step::Delayed(delay, status, body)) => {
                tokio::time::sleep(delay).await;
                Ok(TransportResponse { status, body })
            }
            Some(Step::Fail(err)) => Err(err),
            Some(Step::Hang) => std::future::pending().await,
            None => Err(TransportError::Connection(format!("no script for {path}"))),
        }
    }
}

/// Success envelope around `data`.
pub fn ok(data: Value) -> Step {
    Step::Respond(200, json!({"code": 200, "message": "ok", "data": data}).to_string())
}

/// Envelope with a non-success business code.
pub fn business(code: i64, message: &str) -> Step {
    Step::Respond(200, json!({"code": code, "message": message, "data": null}).to_string())
}

pub fn token_expired() -> Step {
    business(401, "token expired")
}

/// Refresher that counts calls and hands out `fresh-N` tokens.
pub struct CountingRefresher {
    pub calls: AtomicUsize,
    pub delay: Duration,
    pub fail: bool,
}

impl CountingRefresher {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            delay,
            fail: false,
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
            fail: true,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenRefresher for CountingRefresher {
    async fn refresh(&self, _refresh_token: &str) -> Result<TokenSet, ApiError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(ApiError::auth("refresh token revoked"));
        }
        Ok(TokenSet::new(format!("fresh-{n}"), Some("refresh-2".into()), 3600))
    }
}

/// Everything a dispatch test needs to inspect.
pub struct Harness {
    pub dispatcher: Dispatcher,
    pub transport: Arc<ScriptedTransport>,
    pub notifier: Arc<RecordingNotifier>,
    pub refresher: Arc<CountingRefresher>,
    pub store: Arc<MemoryCredentialStore>,
}

/// Dispatcher over a scripted transport with a valid `old-token`.
pub fn harness() -> Harness {
    harness_with(TokenSet::new("old-token", Some("refresh-1".into()), 3600), CountingRefresher::new(Duration::ZERO))
}

pub fn harness_with(tokens: TokenSet, refresher: Arc<CountingRefresher>) -> Harness {
    let transport = ScriptedTransport::new();
    let notifier = Arc::new(RecordingNotifier::new());
    let store = Arc::new(MemoryCredentialStore::with_tokens(tokens));

    let dispatcher = Dispatcher::builder(ClientConfig::default(), transport.clone())
        .credentials(store.clone())
        .refresher(refresher.clone())
        .notifier(notifier.clone())
        .build()
        .unwrap();

    Harness {
        dispatcher,
        transport,
        notifier,
        refresher,
        store,
    }
}

/// Raw HTTP/1.1 backend on an ephemeral port. Each connection gets the
/// response produced by `f`; raw requests are recorded.
pub async fn start_programmable_backend<F>(f: F) -> (SocketAddr, Arc<Mutex<Vec<String>>>)
where
    F: Fn(&str) -> (u16, String) + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let f = Arc::new(f);
    let recorded = seen.clone();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    let recorded = recorded.clone();
                    tokio::spawn(async move {
                        let raw = read_request(&mut socket).await;
                        let (status, body) = f(&raw);
                        recorded.lock().unwrap().push(raw);

                        let status_text = match status {
                            200 => "200 OK",
                            400 => "400 Bad Request",
                            401 => "401 Unauthorized",
                            404 => "404 Not Found",
                            502 => "502 Bad Gateway",
                            503 => "503 Service Unavailable",
                            _ => "500 Internal Server Error",
                        };
                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    (addr, seen)
}

/// Read headers and a Content-Length body.
async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        buf.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&buf);
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buf.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// An address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}
