//! Request dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! RequestDescriptor (descriptor.rs)
//!     → Dispatcher::dispatch (dispatcher.rs)
//!         → CacheStore (fresh | stale + background refresh | miss)
//!         → NetworkMonitor (offline → fail fast)
//!         → TokenCoordinator::ensure_valid
//!         → Transport via abortable handle registered in RequestRegistry
//!         → envelope.rs interpret → data | token expired | classified error
//!         → ErrorHandler (UI side effects) on failure
//! ```
//!
//! # Design Decisions
//! - Auth retry is bounded by an explicit flag, never by recursion
//! - Only transport failures are retried, and only when the descriptor asks
//! - Every registry entry is owned by a guard, so all exit paths unregister

pub mod builder;
pub mod descriptor;
pub mod dispatcher;
pub mod envelope;

pub use builder::DispatcherBuilder;
pub use descriptor::RequestDescriptor;
pub use dispatcher::{join_url, Dispatcher, LocationHint};
pub use envelope::{interpret, Envelope, Reply};
