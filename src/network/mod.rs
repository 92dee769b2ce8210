//! Network state subsystem.
//!
//! # Data Flow
//! ```text
//! Platform events (host) ─┐
//!                          ├→ monitor.rs update() → watch channel → subscribers
//! probe.rs (optional) ────┘                       → recovery toast
//!
//! Dispatcher → monitor.is_online() before every transmit
//! ErrorHandler → monitor.claim_offline_notice() before the offline dialog
//! ```
//!
//! # Design Decisions
//! - The monitor assumes online until told otherwise
//! - Subscribers get the current state immediately

pub mod monitor;
pub mod probe;
pub mod state;

pub use monitor::{ExecuteOptions, NetworkMonitor, Transition};
pub use probe::ConnectivityProbe;
pub use state::{NetworkClass, NetworkState};
