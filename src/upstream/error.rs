//! Transport failure classification.
//!
//! Client libraries report connection failures as nested error chains.
//! This module normalizes them into [`TransportErrorKind`] so retry decisions
//! never depend on library-specific error types.

use std::error::Error as StdError;
use std::io;

use thiserror::Error;

/// Normalized transport failure kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    /// Peer reset or dropped the connection mid-exchange.
    ConnectionReset,
    /// Nothing accepted the connection.
    ConnectionRefused,
    /// No response within the attempt deadline.
    Timeout,
    /// Host name resolution failed.
    Dns,
    /// TLS handshake or certificate failure.
    Tls,
    /// Anything else.
    Other,
}

impl TransportErrorKind {
    /// Stable error code reported to callers.
    pub fn code(&self) -> &'static str {
        match self {
            TransportErrorKind::ConnectionReset => "ECONNRESET",
            TransportErrorKind::ConnectionRefused => "ECONNREFUSED",
            TransportErrorKind::Timeout => "ETIMEDOUT",
            TransportErrorKind::Dns => "ENOTFOUND",
            TransportErrorKind::Tls => "ETLS",
            TransportErrorKind::Other => "EUPSTREAM",
        }
    }
}

/// A failed exchange with the upstream.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Classify a `reqwest` failure.
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            TransportErrorKind::Timeout
        } else {
            classify(err)
        };
        Self::new(kind, chain_message(err))
    }
}

/// Walk an error chain and pick the most specific kind.
pub fn classify(err: &(dyn StdError + 'static)) -> TransportErrorKind {
    let mut text = String::new();
    let mut current = Some(err);

    while let Some(e) = current {
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            match io_err.kind() {
                io::ErrorKind::ConnectionRefused => return TransportErrorKind::ConnectionRefused,
                io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::BrokenPipe => return TransportErrorKind::ConnectionReset,
                io::ErrorKind::TimedOut => return TransportErrorKind::Timeout,
                _ => {}
            }
        }
        if let Some(hyper_err) = e.downcast_ref::<hyper::Error>() {
            // "connection closed before message completed"
            if hyper_err.is_incomplete_message() {
                return TransportErrorKind::ConnectionReset;
            }
            if hyper_err.is_timeout() {
                return TransportErrorKind::Timeout;
            }
        }

        text.push_str(&e.to_string().to_ascii_lowercase());
        text.push('\n');
        current = next_source(e);
    }

    if text.contains("dns error") || text.contains("failed to lookup address") {
        TransportErrorKind::Dns
    } else if text.contains("tls") || text.contains("certificate") || text.contains("handshake") {
        TransportErrorKind::Tls
    } else {
        TransportErrorKind::Other
    }
}

// io::Error::source() skips the wrapped error, so step into it explicitly.
fn next_source<'a>(e: &'a (dyn StdError + 'static)) -> Option<&'a (dyn StdError + 'static)> {
    if let Some(io_err) = e.downcast_ref::<io::Error>() {
        if let Some(inner) = io_err.get_ref() {
            return Some(inner as &(dyn StdError + 'static));
        }
    }
    e.source()
}

fn chain_message(err: &(dyn StdError + 'static)) -> String {
    let mut parts = Vec::new();
    let mut current = Some(err);
    while let Some(e) = current {
        let part = e.to_string();
        if !parts.iter().any(|p: &String| p.contains(&part)) {
            parts.push(part);
        }
        current = next_source(e);
    }
    parts.join(": ")
}
