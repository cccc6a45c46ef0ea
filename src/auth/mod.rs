//! Authentication subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     auth.tokens (config) → registry.rs (immutable TokenRegistry)
//!
//! Request under the protected prefix:
//!     → middleware.rs (AuthGate)
//!     → registry.rs (Authorization: Bearer <token> → Principal)
//!     → 401 / 403 JSON, or Principal attached to request extensions
//! ```

pub mod middleware;
pub mod registry;

pub use middleware::{auth_middleware, AuthGate};
pub use registry::{bearer_token, AuthError, Principal, TokenRegistry};
