//! Error normalization subsystem.
//!
//! # Data Flow
//! ```text
//! Transport boundary / envelope parser / ad hoc caller
//!     → Failure (tagged union of everything that can go wrong)
//!     → classify.rs (precedence rules → ApiError)
//!     → handler.rs (log, then toast | modal | re-auth | silence)
//! ```
//!
//! # Design Decisions
//! - One record type (`ApiError`) crosses every public API
//! - Technical and user-facing messages are separate fields and never equal
//! - Gateway/proxy failures are tagged backend-unavailable and kept out of the UI

pub mod classify;
pub mod handler;
pub mod record;

pub use classify::{classify, Failure};
pub use handler::{ErrorHandler, Reaction};
pub use record::{ApiError, ErrorKind, ErrorTag, Severity};
