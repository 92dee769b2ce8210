//! Response cache subsystem.
//!
//! # Freshness tiers
//! ```text
//! age < 0.8 × ttl        → fresh: served, nothing else happens
//! 0.8 × ttl ≤ age < ttl  → stale: served, dispatcher revalidates in background
//! age ≥ ttl              → expired: evicted on access, treated as a miss
//! ```
//!
//! # Design Decisions
//! - Lazy eviction on read; `purge_expired` exists for callers that want a sweep
//! - Ages use `tokio::time::Instant` so paused-clock tests can drive them
//! - Keys are the request URL plus canonically serialized params

pub mod store;

pub use store::{cache_key, CacheHit, CacheStore, REVALIDATE_RATIO};
