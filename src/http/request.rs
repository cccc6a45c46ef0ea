//! Request identification.
//!
//! # Responsibilities
//! - Name the correlation header
//! - Generate UUID v4 correlation IDs for the request-id layer
//! - Read the correlation ID back in handlers and middleware
//!
//! # Design Decisions
//! - IDs are assigned by `tower_http::request_id` as early as possible and
//!   echoed on the response
//! - A caller-supplied `x-request-id` is kept as is

use axum::http::{HeaderMap, HeaderValue, Request};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

/// Correlation header carried on requests, upstream calls and responses.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Generates a fresh UUID v4 for requests that arrive without an ID.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeCorrelationId;

impl MakeRequestId for MakeCorrelationId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Correlation ID of a request, or `"unknown"` when none is present.
pub fn correlation_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}
