//! Terminal proxy errors and their HTTP representation.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::upstream::TransportError;

/// Errors surfaced to the caller when a request cannot be proxied.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Engine could not be constructed from its settings.
    #[error("invalid proxy configuration: {0}")]
    Config(String),

    /// Inbound request could not be turned into an upstream request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Every permitted attempt failed at the transport level.
    #[error("{source}")]
    Upstream {
        source: TransportError,
        attempts: u32,
        retried: bool,
    },
}

/// JSON body of a terminal error response.
#[derive(Debug, Serialize)]
pub struct ErrorPayload {
    pub error: &'static str,
    pub message: String,
    pub code: &'static str,
    pub retried: bool,
    pub attempts: u32,
}

impl ProxyError {
    pub fn code(&self) -> &'static str {
        match self {
            ProxyError::Config(_) => "ECONFIG",
            ProxyError::InvalidRequest(_) => "EBADREQUEST",
            ProxyError::Upstream { source, .. } => source.code(),
        }
    }

    pub fn retried(&self) -> bool {
        matches!(self, ProxyError::Upstream { retried: true, .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            ProxyError::Upstream { attempts, .. } => *attempts,
            _ => 0,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ProxyError::Config(_) | ProxyError::Upstream { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn payload(&self) -> ErrorPayload {
        ErrorPayload {
            error: "Proxy error occurred",
            message: self.to_string(),
            code: self.code(),
            retried: self.retried(),
            attempts: self.attempts(),
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.payload())).into_response()
    }
}
