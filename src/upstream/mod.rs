//! Upstream connection subsystem.
//!
//! # Data Flow
//! ```text
//! ProxyEngine
//!     → manager.rs (origin → shared transport, created once)
//!     → transport.rs (pool slot, keep-alive client, attempt timeout)
//!     → upstream service
//!     → error.rs (failure → normalized TransportErrorKind)
//! ```
//!
//! # Design Decisions
//! - Transports are safe for concurrent use; callers never lock
//! - Failure classification is an explicit predicate over a closed enum

pub mod error;
pub mod manager;
pub mod origin;
pub mod transport;

pub use error::{TransportError, TransportErrorKind};
pub use manager::ConnectionManager;
pub use origin::Origin;
pub use transport::{
    BodyStream, OutboundRequest, PooledTransport, ResponseBody, Transport, TransportSettings,
    UpstreamResponse,
};
