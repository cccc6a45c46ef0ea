//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Root configuration for the proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Upstream origin and outbound credential.
    pub upstream: UpstreamConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Retry configuration.
    pub retries: RetryConfig,

    /// Bearer-token authorization for the protected prefix.
    pub auth: AuthConfig,

    /// Path rewrite applied before forwarding.
    pub rewrite: RewriteConfig,

    /// Response buffering thresholds.
    pub streaming: StreamingConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Inbound limits and CORS.
    pub security: SecurityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
        }
    }
}

/// Upstream service configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the upstream (e.g., "http://127.0.0.1:11434").
    pub url: String,

    /// Static bearer token presented to the upstream when the caller
    /// did not send an `Authorization` header.
    pub credential: Option<String>,

    /// Connection pool limits.
    pub pool: PoolConfig,
}

/// Per-origin connection pool limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum concurrent in-flight exchanges per origin.
    pub max_connections: usize,

    /// Maximum idle keep-alive connections retained per origin.
    pub max_idle: usize,

    /// Idle connections are evicted after this many seconds.
    pub idle_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 64,
            max_idle: 16,
            idle_timeout_secs: 90,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Per-attempt timeout in seconds, until upstream response headers arrive.
    pub attempt_secs: u64,

    /// Deadline in seconds for the whole forward, across every attempt and
    /// retry delay, until response headers are produced. Must cover
    /// `max_attempts * attempt_secs` plus the delays between attempts.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            attempt_secs: 300,
            request_secs: 605,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total dispatch attempts, including the first one.
    pub max_attempts: u32,

    /// Fixed delay between attempts in milliseconds.
    pub delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            delay_ms: 1000,
        }
    }
}

/// Authorization configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Require a registered bearer token under `prefix`.
    /// When false the proxy relays without checking callers.
    pub required: bool,

    /// Path prefix that is proxied (and protected).
    pub prefix: String,

    /// Token to principal mapping.
    pub tokens: HashMap<String, String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            required: true,
            prefix: "/api".to_string(),
            tokens: HashMap::new(),
        }
    }
}

/// Path rewrite rule.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RewriteConfig {
    /// Forward the path unchanged.
    None,
    /// Remove `prefix` from the start of the path when present.
    StripPrefix { prefix: String },
    /// Always prepend `prefix`.
    AddPrefix { prefix: String },
    /// Prepend `prefix` unless the path already starts with it.
    EnsurePrefix { prefix: String },
}

impl Default for RewriteConfig {
    fn default() -> Self {
        RewriteConfig::StripPrefix {
            prefix: "/api".to_string(),
        }
    }
}

/// Response buffering configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Largest declared `Content-Length` that is buffered before relaying.
    pub max_buffered_body: usize,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            max_buffered_body: 1024 * 1024,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum inbound body size in bytes.
    pub max_body_size: usize,
    /// Answer CORS preflights and allow any origin.
    pub cors_enabled: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 10 * 1024 * 1024, // 10MB
            cors_enabled: true,
        }
    }
}
