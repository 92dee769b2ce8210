//! Request lifecycle subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatch (registry.rs):
//!     abortable send → register(id, handle, context) → TaskGuard
//!     call completes / fails / is dropped → guard drops → entry removed
//!
//! Cancellation:
//!     cancel(id) | cancel_by_context(tag) | cancel_all() → abort handles
//!
//! Background (sweeper.rs), until shutdown.rs fires:
//!     every sweep interval → cancel tasks older than the stale threshold
//!     every purge interval → drop expired cache entries
//! ```
//!
//! # Design Decisions
//! - Registering an id that is already in flight aborts the older call
//! - Abort failures are logged and swallowed
//! - Debounce/throttle live here because they gate when calls start

pub mod registry;
pub mod scheduling;
pub mod shutdown;
pub mod sweeper;

pub use registry::{RequestRegistry, TaskGuard};
pub use scheduling::{Debouncer, Throttler};
pub use shutdown::Shutdown;
pub use sweeper::{CachePurger, StaleTaskSweeper};
