//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate the upstream URL and bind address
//! - Validate value ranges (timeouts > 0, pool sizes > 0)
//! - Check that a protected prefix has tokens to check against
//! - Check that relay mode has an upstream credential to inject
//! - Check that the request deadline leaves room for every retry
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::{ProxyConfig, RewriteConfig};

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("upstream.url is required")]
    MissingUpstream,

    #[error("upstream.url {url:?} is invalid: {reason}")]
    InvalidUpstream { url: String, reason: String },

    #[error("listener.bind_address {0:?} is not a socket address")]
    InvalidBindAddress(String),

    #[error("auth.required is set but auth.tokens is empty")]
    NoTokens,

    #[error("auth.tokens contains an empty token")]
    EmptyToken,

    #[error("{field} {value:?} must start with '/'")]
    InvalidPrefix { field: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("auth.required is false but upstream.credential is not set")]
    MissingCredential,

    #[error(
        "timeouts.request_secs ({request_ms} ms) is shorter than every attempt plus retry delays ({needed_ms} ms)"
    )]
    RequestDeadlineTooShort { request_ms: u64, needed_ms: u64 },
}

/// Check a deserialized configuration for semantic errors.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let upstream = config.upstream.url.trim();
    if upstream.is_empty() {
        errors.push(ValidationError::MissingUpstream);
    } else {
        match Url::parse(upstream) {
            Ok(url) if !matches!(url.scheme(), "http" | "https") => {
                errors.push(ValidationError::InvalidUpstream {
                    url: upstream.to_string(),
                    reason: format!("unsupported scheme {}", url.scheme()),
                });
            }
            Ok(url) if url.host_str().is_none() => {
                errors.push(ValidationError::InvalidUpstream {
                    url: upstream.to_string(),
                    reason: "missing host".to_string(),
                });
            }
            Ok(_) => {}
            Err(e) => errors.push(ValidationError::InvalidUpstream {
                url: upstream.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.auth.required && config.auth.tokens.is_empty() {
        errors.push(ValidationError::NoTokens);
    }
    if config.auth.tokens.keys().any(|t| t.trim().is_empty()) {
        errors.push(ValidationError::EmptyToken);
    }
    let has_credential = config
        .upstream
        .credential
        .as_deref()
        .is_some_and(|c| !c.trim().is_empty());
    if !config.auth.required && !has_credential {
        errors.push(ValidationError::MissingCredential);
    }

    if !config.auth.prefix.starts_with('/') {
        errors.push(ValidationError::InvalidPrefix {
            field: "auth.prefix",
            value: config.auth.prefix.clone(),
        });
    }
    match &config.rewrite {
        RewriteConfig::None => {}
        RewriteConfig::StripPrefix { prefix }
        | RewriteConfig::AddPrefix { prefix }
        | RewriteConfig::EnsurePrefix { prefix } => {
            if !prefix.starts_with('/') {
                errors.push(ValidationError::InvalidPrefix {
                    field: "rewrite.prefix",
                    value: prefix.clone(),
                });
            }
        }
    }

    let positive: [(&'static str, u64); 6] = [
        ("retries.max_attempts", u64::from(config.retries.max_attempts)),
        ("upstream.pool.max_connections", config.upstream.pool.max_connections as u64),
        ("upstream.pool.idle_timeout_secs", config.upstream.pool.idle_timeout_secs),
        ("timeouts.connect_secs", config.timeouts.connect_secs),
        ("timeouts.attempt_secs", config.timeouts.attempt_secs),
        ("timeouts.request_secs", config.timeouts.request_secs),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::Zero(field));
        }
    }

    let attempts = u64::from(config.retries.max_attempts);
    let needed_ms = attempts
        .saturating_mul(config.timeouts.attempt_secs.saturating_mul(1000))
        .saturating_add(attempts.saturating_sub(1).saturating_mul(config.retries.delay_ms));
    let request_ms = config.timeouts.request_secs.saturating_mul(1000);
    if request_ms < needed_ms {
        errors.push(ValidationError::RequestDeadlineTooShort {
            request_ms,
            needed_ms,
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
