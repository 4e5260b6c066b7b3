//! Per-client request rate limiting for the HTTP API.
//!
//! Fixed-window counters keyed by client IP, held in memory:
//! - `memory`: the counter store and the allow/deny decision
//! - `layer`: axum middleware that applies a limiter to a router
//!
//! State is not persisted across restarts.

mod config;
mod layer;
mod memory;

pub use config::RateLimitConfig;
pub use layer::{rate_limit, CLIENT_UNKNOWN};
pub use memory::{Decision, FixedWindowLimiter};
