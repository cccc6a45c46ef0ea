//! Authorization middleware for the protected prefix.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::auth::registry::{AuthError, TokenRegistry};
use crate::http::request::correlation_id;
use crate::observability::metrics;

/// Validates inbound bearer tokens against the registry.
#[derive(Debug, Clone)]
pub struct AuthGate {
    registry: Arc<TokenRegistry>,
    required: bool,
}

impl AuthGate {
    /// Gate that rejects requests without a registered token.
    pub fn new(registry: Arc<TokenRegistry>) -> Self {
        Self {
            registry,
            required: true,
        }
    }

    /// Gate that lets every request through (relay mode).
    pub fn disabled() -> Self {
        Self {
            registry: Arc::new(TokenRegistry::default()),
            required: false,
        }
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn registry(&self) -> &TokenRegistry {
        &self.registry
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match self {
            AuthError::MissingToken => StatusCode::UNAUTHORIZED,
            AuthError::InvalidToken => StatusCode::FORBIDDEN,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Rejects unauthenticated requests; attaches the resolved
/// [`Principal`](crate::auth::Principal) to the request extensions otherwise.
pub async fn auth_middleware(
    State(gate): State<Arc<AuthGate>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if !gate.required {
        return next.run(request).await;
    }

    match gate.registry.authenticate(request.headers()) {
        Ok(principal) => {
            tracing::info!(
                request_id = %correlation_id(request.headers()),
                principal = %principal,
                "User is making a request"
            );
            request.extensions_mut().insert(principal);
            next.run(request).await
        }
        Err(e) => {
            tracing::warn!(
                request_id = %correlation_id(request.headers()),
                path = %request.uri().path(),
                reason = e.reason(),
                "Rejected request"
            );
            metrics::record_auth_rejection(e.reason());
            e.into_response()
        }
    }
}
