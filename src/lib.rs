//! Authenticating reverse proxy library.

pub mod auth;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod proxy;
pub mod resilience;
pub mod upstream;

pub use auth::{AuthGate, Principal, TokenRegistry};
pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use proxy::{ProxyEngine, ProxyError};
pub use upstream::ConnectionManager;
