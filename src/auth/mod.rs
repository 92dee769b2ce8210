//! Token management subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatcher (before transport)
//!     → coordinator.rs ensure_valid()
//!         valid token      → return it
//!         near expiry/none → join or start the single pending refresh
//!             → refresher.rs (POST refresh token, read envelope)
//!             → credentials.rs (persist new TokenSet | clear on failure)
//!
//! Dispatcher (401 / TOKEN_EXPIRED)
//!     → coordinator.rs renew_after_rejection(rejected)
//! ```
//!
//! # Design Decisions
//! - Exactly one refresh call in flight; followers await the same shared future
//! - A failed refresh always clears stored credentials
//! - The credential store is a trait so hosts can back it with a keychain

pub mod coordinator;
pub mod credentials;
pub mod refresher;

pub use coordinator::TokenCoordinator;
pub use credentials::{
    CredentialError, CredentialStore, FileCredentialStore, MemoryCredentialStore, TokenSet,
};
pub use refresher::{HttpTokenRefresher, TokenRefresher};
