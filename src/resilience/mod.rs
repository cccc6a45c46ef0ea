//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatch to upstream:
//!     → transport enforces connect/attempt timeouts
//!     → On transport failure: retries.rs (classify, retry once after a fixed delay)
//!     → Exhausted or non-transient: terminal ProxyError
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every dispatch has a deadline
//! - Narrow retry policy: only reset/refused connections
//! - Upstream HTTP error statuses are never retried

pub mod retries;

pub use retries::{is_transient, RetryDecision, RetryPhase, RetryPolicy, RetryState};
