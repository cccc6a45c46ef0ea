//! Route handlers.

use std::error::Error as StdError;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{Extension, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use http_body_util::LengthLimitError;
use serde_json::json;

use crate::auth::Principal;
use crate::http::request::correlation_id;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::proxy::{relay, InboundRequest, ProxyError};

/// Liveness check. Never authenticated, never forwarded.
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Forward a request under the protected prefix to the upstream.
pub async fn proxy_handler(
    State(state): State<AppState>,
    principal: Option<Extension<Principal>>,
    request: Request<Body>,
) -> Response {
    let start = Instant::now();
    let (parts, body) = request.into_parts();
    let method = parts.method.clone();
    let request_id = correlation_id(&parts.headers).to_string();

    let body = match axum::body::to_bytes(body, state.max_body_size).await {
        Ok(bytes) => bytes,
        Err(e) => {
            let response = body_error(&request_id, e);
            metrics::record_request(method.as_str(), response.status().as_u16(), start);
            return response;
        }
    };

    let inbound = InboundRequest::new(parts.method, parts.uri, parts.headers, body)
        .with_principal(principal.map(|Extension(p)| p));

    tracing::debug!(
        request_id = %request_id,
        method = %inbound.method,
        path = %inbound.uri.path(),
        principal = inbound.principal.as_ref().map(Principal::as_str).unwrap_or("-"),
        "Proxying request"
    );

    let response = match state.engine.forward(inbound).await {
        Ok(upstream) => relay(upstream, &request_id),
        Err(e) => e.into_response(),
    };

    metrics::record_request(method.as_str(), response.status().as_u16(), start);
    response
}

fn body_error(request_id: &str, err: axum::Error) -> Response {
    if is_length_limit(&err) {
        tracing::warn!(request_id = %request_id, "Request body too large");
        return (
            StatusCode::PAYLOAD_TOO_LARGE,
            Json(json!({ "error": "Request body too large" })),
        )
            .into_response();
    }

    tracing::warn!(request_id = %request_id, error = %err, "Failed to read request body");
    ProxyError::InvalidRequest(format!("failed to read request body: {}", err)).into_response()
}

/// Whether `err`, or anything it wraps, is a body limit violation.
fn is_length_limit(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if e.is::<LengthLimitError>() {
            return true;
        }
        current = e.source();
    }
    false
}
