//! Relaying upstream responses to the caller.
//!
//! # Responsibilities
//! - Copy status and end-to-end headers from the upstream
//! - Force no-buffering directives on every relayed response
//! - Relay streamed bodies chunk by chunk, buffered bodies in one piece
//!
//! # Design Decisions
//! - `Content-Length` is relayed unless the upstream framed its body as
//!   chunked; `Transfer-Encoding` is always dropped and the server picks
//!   the outbound framing
//! - Byte counts for streams are logged when the stream ends or is dropped

use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue};
use axum::response::Response;
use futures_util::stream::StreamExt;

use crate::proxy::request::is_hop_by_hop;
use crate::upstream::{BodyStream, ResponseBody, TransportError, UpstreamResponse};

/// Disables response buffering in nginx-style intermediaries.
pub const X_ACCEL_BUFFERING: &str = "x-accel-buffering";

/// Build the caller-facing response from an upstream response.
pub fn relay(upstream: UpstreamResponse, correlation_id: &str) -> Response {
    let UpstreamResponse {
        status,
        headers,
        body,
    } = upstream;

    let mut relayed = relay_headers(&headers);
    apply_streaming_directives(&mut relayed);

    let body = match body {
        ResponseBody::Buffered(bytes) => {
            tracing::debug!(
                request_id = %correlation_id,
                status = status.as_u16(),
                bytes = bytes.len(),
                "Relaying buffered response"
            );
            Body::from(bytes)
        }
        ResponseBody::Streaming(stream) => {
            tracing::debug!(
                request_id = %correlation_id,
                status = status.as_u16(),
                "Relaying streamed response"
            );
            Body::from_stream(counted(stream, correlation_id.to_string()))
        }
    };

    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = relayed;
    response
}

/// End-to-end headers from the upstream.
pub fn relay_headers(upstream: &HeaderMap) -> HeaderMap {
    // A length alongside chunked framing is not authoritative.
    let chunked = upstream.contains_key(header::TRANSFER_ENCODING);

    let mut headers = HeaderMap::with_capacity(upstream.len() + 3);
    for (name, value) in upstream.iter() {
        if is_hop_by_hop(name) {
            continue;
        }
        if chunked && name == header::CONTENT_LENGTH {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers
}

/// Set `Cache-Control: no-cache`, `Connection: keep-alive` and
/// `X-Accel-Buffering: no`, replacing whatever the upstream sent.
pub fn apply_streaming_directives(headers: &mut HeaderMap) {
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(
        HeaderName::from_static(X_ACCEL_BUFFERING),
        HeaderValue::from_static("no"),
    );
}

struct StreamSummary {
    correlation_id: String,
    bytes: usize,
    chunks: usize,
    started: Instant,
    completed: bool,
}

impl Drop for StreamSummary {
    fn drop(&mut self) {
        if self.completed {
            tracing::info!(
                request_id = %self.correlation_id,
                bytes = self.bytes,
                chunks = self.chunks,
                elapsed_ms = self.started.elapsed().as_millis() as u64,
                "Streamed response complete"
            );
        } else {
            tracing::info!(
                request_id = %self.correlation_id,
                bytes = self.bytes,
                chunks = self.chunks,
                "Streamed response ended early"
            );
        }
    }
}

fn counted(
    stream: BodyStream,
    correlation_id: String,
) -> impl futures_util::Stream<Item = Result<Bytes, TransportError>> + Send + 'static {
    let mut summary = StreamSummary {
        correlation_id,
        bytes: 0,
        chunks: 0,
        started: Instant::now(),
        completed: false,
    };

    stream
        .map(Some)
        .chain(futures_util::stream::once(async { None }))
        .filter_map(move |item| {
            let out = match item {
                Some(Ok(chunk)) => {
                    summary.bytes += chunk.len();
                    summary.chunks += 1;
                    Some(Ok(chunk))
                }
                Some(Err(e)) => {
                    tracing::warn!(
                        request_id = %summary.correlation_id,
                        error = %e,
                        code = e.code(),
                        "Upstream stream failed"
                    );
                    Some(Err(e))
                }
                None => {
                    summary.completed = true;
                    None
                }
            };
            futures_util::future::ready(out)
        })
}
