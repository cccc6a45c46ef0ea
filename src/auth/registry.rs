//! Token registry and bearer-token authentication.
//!
//! # Responsibilities
//! - Hold the immutable token → principal table built at startup
//! - Extract the bearer token from request headers
//! - Resolve it to a principal or reject
//!
//! # Design Decisions
//! - Registry is never mutated after construction (shared via Arc, no locks)
//! - Authentication is a pure function of (headers, registry)

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use axum::http::{header, HeaderMap};
use thiserror::Error;

/// Identity resolved from a valid token. Used for attribution only.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Principal(Arc<str>);

impl Principal {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why a request was not authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No `Authorization: Bearer <token>` header.
    #[error("No token provided")]
    MissingToken,
    /// Token is not registered.
    #[error("Invalid token")]
    InvalidToken,
}

impl AuthError {
    /// Short label for logs and metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "missing_token",
            AuthError::InvalidToken => "invalid_token",
        }
    }
}

/// Immutable mapping from opaque token to principal.
#[derive(Debug, Clone, Default)]
pub struct TokenRegistry {
    tokens: HashMap<String, Principal>,
}

impl TokenRegistry {
    /// Build the registry from `(token, principal)` pairs.
    pub fn new<I, T, P>(entries: I) -> Self
    where
        I: IntoIterator<Item = (T, P)>,
        T: Into<String>,
        P: AsRef<str>,
    {
        Self {
            tokens: entries
                .into_iter()
                .map(|(token, principal)| (token.into(), Principal::new(principal)))
                .collect(),
        }
    }

    pub fn lookup(&self, token: &str) -> Option<&Principal> {
        self.tokens.get(token)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Registered principal names, sorted.
    pub fn principals(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tokens.values().map(Principal::as_str).collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    /// Validate the bearer token carried by `headers`.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<Principal, AuthError> {
        let token = bearer_token(headers).ok_or(AuthError::MissingToken)?;
        self.lookup(token).cloned().ok_or(AuthError::InvalidToken)
    }
}

/// Extract `<token>` from `Authorization: Bearer <token>`.
/// The scheme is matched case-insensitively.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let mut parts = value.split_whitespace();
    let scheme = parts.next()?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    parts.next()
}
