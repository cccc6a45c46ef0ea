//! Proxy subsystem.
//!
//! # Data Flow
//! ```text
//! http handler
//!     → request.rs (InboundRequest, outbound construction)
//!     → rewrite.rs (path rule)
//!     → engine.rs (retry loop over the upstream transport)
//!     → response.rs (relay headers and body to the caller)
//!     → error.rs (terminal failures as JSON)
//! ```

pub mod engine;
pub mod error;
pub mod request;
pub mod response;
pub mod rewrite;

pub use engine::ProxyEngine;
pub use error::{ErrorPayload, ProxyError};
pub use request::{bearer_credential, build_outbound, InboundRequest};
pub use response::relay;
pub use rewrite::PathRewrite;
