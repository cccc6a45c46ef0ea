//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request ID assigned and echoed)
//!     → auth gate (protected prefix only)
//!     → handlers.rs (health, or read body and hand to the proxy engine)
//!     → Send to client
//! ```

pub mod handlers;
pub mod request;
pub mod server;

pub use request::{correlation_id, MakeCorrelationId, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
