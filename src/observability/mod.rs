//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events, request ID on every event)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Metrics are opt-in and cheap when disabled
//! - Bearer tokens never appear in logs; credentials are masked

pub mod logging;
pub mod metrics;

pub use self::logging::init_logging;
pub use self::metrics::init_metrics;

/// First eight characters of a secret, for startup diagnostics.
pub fn mask_secret(secret: &str) -> String {
    let visible: String = secret.chars().take(8).collect();
    format!("{}...", visible)
}
