//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatcher transmit (when the descriptor carries a RetryPolicy):
//!     → retries.rs (run attempt, check if retryable)
//!     → backoff.rs (exponential delay with jitter, capped)
//!     → next attempt
//! ```
//!
//! # Design Decisions
//! - Only transport failures are retried; a response of any status is final
//! - Jittered backoff prevents thundering herd after an outage

pub mod backoff;
pub mod retries;

pub use backoff::backoff_delay;
pub use retries::{retry_with_backoff, RetryPolicy, DEFAULT_MAX_DELAY};
