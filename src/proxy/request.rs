//! Inbound request capture and outbound request construction.
//!
//! # Responsibilities
//! - Capture the parts of an inbound request the engine needs
//! - Rewrite the path against the upstream base URL
//! - Strip hop-by-hop headers, keep everything else verbatim
//! - Inject the outbound credential when the caller sent no `Authorization`
//!
//! # Design Decisions
//! - The body is held as `Bytes` so every attempt replays identical bytes
//! - `Host` is dropped; the client derives it from the upstream URL

use axum::body::Bytes;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, Uri};
use url::Url;

use crate::auth::Principal;
use crate::http::request::X_REQUEST_ID;
use crate::proxy::error::ProxyError;
use crate::proxy::rewrite::PathRewrite;
use crate::upstream::OutboundRequest;

/// Request as received from the caller, body fully read.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Caller-supplied or generated `x-request-id`.
    pub correlation_id: String,
    /// Identity established by the auth gate, if any.
    pub principal: Option<Principal>,
}

impl InboundRequest {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Self {
        let correlation_id = crate::http::request::correlation_id(&headers).to_string();
        Self {
            method,
            uri,
            headers,
            body,
            correlation_id,
            principal: None,
        }
    }

    pub fn with_principal(mut self, principal: Option<Principal>) -> Self {
        self.principal = principal;
        self
    }
}

/// Derive the upstream request from an inbound one.
pub fn build_outbound(
    inbound: &InboundRequest,
    upstream: &Url,
    rewrite: &PathRewrite,
    credential: Option<&HeaderValue>,
) -> Result<OutboundRequest, ProxyError> {
    let url = target_url(upstream, rewrite, &inbound.uri);

    let mut headers = HeaderMap::with_capacity(inbound.headers.len() + 2);
    for (name, value) in inbound.headers.iter() {
        if is_hop_by_hop(name) || name == header::HOST || name == header::CONTENT_LENGTH {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    strip_connection_listed(&inbound.headers, &mut headers);

    if !inbound.body.is_empty() {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(inbound.body.len()));
        if !headers.contains_key(header::CONTENT_TYPE) {
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/octet-stream"),
            );
        }
    }

    if !headers.contains_key(header::AUTHORIZATION) {
        if let Some(credential) = credential {
            headers.insert(header::AUTHORIZATION, credential.clone());
        }
    }

    let request_id = HeaderValue::from_str(&inbound.correlation_id)
        .map_err(|e| ProxyError::InvalidRequest(format!("x-request-id: {}", e)))?;
    headers.insert(X_REQUEST_ID, request_id);

    Ok(OutboundRequest {
        method: inbound.method.clone(),
        url,
        headers,
        body: inbound.body.clone(),
    })
}

/// `Bearer <token>` header value for the outbound leg.
pub fn bearer_credential(token: &str) -> Result<HeaderValue, ProxyError> {
    let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
        .map_err(|_| ProxyError::Config("upstream credential is not a valid header value".into()))?;
    value.set_sensitive(true);
    Ok(value)
}

/// Hop-by-hop headers are never forwarded in either direction.
pub fn is_hop_by_hop(name: &HeaderName) -> bool {
    matches!(
        name.as_str(),
        "connection"
            | "keep-alive"
            | "proxy-connection"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "upgrade"
    )
}

// Headers named in `Connection: a, b` are hop-by-hop too.
fn strip_connection_listed(original: &HeaderMap, headers: &mut HeaderMap) {
    for value in original.get_all(header::CONNECTION) {
        let Ok(value) = value.to_str() else { continue };
        for name in value.split(',') {
            if let Ok(name) = HeaderName::from_bytes(name.trim().as_bytes()) {
                headers.remove(name);
            }
        }
    }
}

fn target_url(upstream: &Url, rewrite: &PathRewrite, uri: &Uri) -> Url {
    let rewritten = rewrite.apply(uri.path());
    let base = upstream.path().trim_end_matches('/');

    let mut url = upstream.clone();
    url.set_path(&format!("{}{}", base, rewritten));
    url.set_query(uri.query());
    url.set_fragment(None);
    url
}
