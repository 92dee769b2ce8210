//! Resilient API client core.
//!
//! Every outbound backend call goes through one [`Dispatcher`], which layers
//! caching, token renewal, retry, cancellation and error classification over
//! a black-box [`Transport`].
//!
//! ```text
//!   caller ──▶ Dispatcher ──▶ CacheStore ─ hit ─────────────────────────▶ data
//!                  │
//!                  ├──▶ NetworkMonitor (offline → fail fast)
//!                  ├──▶ TokenCoordinator (single-flight refresh)
//!                  ├──▶ RequestRegistry ◀── abort handle ──┐
//!                  │                                       │
//!                  └──▶ Transport ─────────────────────────┘──▶ envelope ──▶ data
//!                                                                   │
//!                                        ErrorHandler ◀── ApiError ◀┘
//!                                            │
//!                                            └──▶ Notifier (toast / modal / login)
//! ```

// Core
pub mod dispatch;
pub mod transport;

// Collaborating subsystems
pub mod auth;
pub mod cache;
pub mod lifecycle;
pub mod network;

// Cross-cutting concerns
pub mod config;
pub mod error;
pub mod notify;
pub mod observability;
pub mod resilience;

mod clock;

pub use config::ClientConfig;
pub use dispatch::{Dispatcher, DispatcherBuilder, LocationHint, RequestDescriptor};
pub use error::{ApiError, ErrorKind, Failure};
pub use lifecycle::Shutdown;
pub use transport::{ReqwestTransport, Transport};
