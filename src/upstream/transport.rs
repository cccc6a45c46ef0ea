//! Upstream transport.
//!
//! # Responsibilities
//! - Define the exchange types (`OutboundRequest`, `UpstreamResponse`)
//! - Define the `Transport` seam the engine dispatches through
//! - Provide the pooled keep-alive implementation
//!
//! # Design Decisions
//! - One `reqwest::Client` per origin owns the keep-alive pool
//! - A semaphore bounds concurrent exchanges; excess requests queue on it
//! - A permit lives until the response body is fully read or the relayed
//!   stream is dropped
//! - Redirects are relayed to the caller, never followed

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{header, HeaderMap, Method, StatusCode};
use futures_util::future::BoxFuture;
use futures_util::stream::{BoxStream, StreamExt};
use tokio::sync::Semaphore;
use url::Url;

use crate::config::ProxyConfig;
use crate::upstream::error::{TransportError, TransportErrorKind};
use crate::upstream::origin::Origin;

/// Live upstream body relayed as it arrives.
pub type BodyStream = BoxStream<'static, Result<Bytes, TransportError>>;

/// Request sent to the upstream. Cheap to clone so attempts can be replayed.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Upstream response body.
pub enum ResponseBody {
    /// Fully read, bounded body.
    Buffered(Bytes),
    /// Chunked or unbounded body, relayed incrementally.
    Streaming(BodyStream),
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseBody::Buffered(bytes) => f.debug_tuple("Buffered").field(&bytes.len()).finish(),
            ResponseBody::Streaming(_) => f.write_str("Streaming"),
        }
    }
}

/// Response received from the upstream.
#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: ResponseBody,
}

/// A pooled connection to one upstream origin, safe for concurrent use.
pub trait Transport: Send + Sync {
    /// Origin this transport talks to.
    fn origin(&self) -> &Origin;

    /// Perform one exchange.
    fn dispatch(
        &self,
        request: OutboundRequest,
    ) -> BoxFuture<'_, Result<UpstreamResponse, TransportError>>;
}

/// Pool and timeout settings for [`PooledTransport`].
#[derive(Debug, Clone)]
pub struct TransportSettings {
    pub max_connections: usize,
    pub max_idle: usize,
    pub idle_timeout: Duration,
    pub connect_timeout: Duration,
    pub attempt_timeout: Duration,
    pub max_buffered_body: usize,
}

impl TransportSettings {
    pub fn from_config(config: &ProxyConfig) -> Self {
        Self {
            max_connections: config.upstream.pool.max_connections,
            max_idle: config.upstream.pool.max_idle,
            idle_timeout: Duration::from_secs(config.upstream.pool.idle_timeout_secs),
            connect_timeout: Duration::from_secs(config.timeouts.connect_secs),
            attempt_timeout: Duration::from_secs(config.timeouts.attempt_secs),
            max_buffered_body: config.streaming.max_buffered_body,
        }
    }
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self::from_config(&ProxyConfig::default())
    }
}

/// Keep-alive transport backed by a `reqwest` connection pool.
#[derive(Debug)]
pub struct PooledTransport {
    origin: Origin,
    client: reqwest::Client,
    permits: Arc<Semaphore>,
    attempt_timeout: Duration,
    max_buffered_body: usize,
}

impl PooledTransport {
    pub fn new(origin: Origin, settings: &TransportSettings) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(settings.max_idle)
            .pool_idle_timeout(settings.idle_timeout)
            .connect_timeout(settings.connect_timeout)
            .tcp_keepalive(Some(Duration::from_secs(60)))
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy()
            .build()
            .map_err(|e| TransportError::from_reqwest(&e))?;

        Ok(Self {
            origin,
            client,
            permits: Arc::new(Semaphore::new(settings.max_connections.max(1))),
            attempt_timeout: settings.attempt_timeout,
            max_buffered_body: settings.max_buffered_body,
        })
    }

    /// Exchanges that can start without queueing.
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }
}

impl Transport for PooledTransport {
    fn origin(&self) -> &Origin {
        &self.origin
    }

    fn dispatch(
        &self,
        request: OutboundRequest,
    ) -> BoxFuture<'_, Result<UpstreamResponse, TransportError>> {
        Box::pin(async move {
            let permit = self.permits.clone().acquire_owned().await.map_err(|_| {
                TransportError::new(TransportErrorKind::Other, "connection pool closed")
            })?;

            let send = self
                .client
                .request(request.method, request.url)
                .headers(request.headers)
                .body(request.body)
                .send();

            let response = match tokio::time::timeout(self.attempt_timeout, send).await {
                Ok(Ok(response)) => response,
                Ok(Err(e)) => return Err(TransportError::from_reqwest(&e)),
                Err(_) => {
                    return Err(TransportError::new(
                        TransportErrorKind::Timeout,
                        format!(
                            "no response from {} within {:?}",
                            self.origin, self.attempt_timeout
                        ),
                    ))
                }
            };

            let status = response.status();
            let headers = response.headers().clone();

            let body = if should_stream(&headers, self.max_buffered_body) {
                let stream = response.bytes_stream().map(move |chunk| {
                    // Hold the pool slot until the stream is finished or dropped.
                    let _slot = &permit;
                    chunk.map_err(|e| TransportError::from_reqwest(&e))
                });
                ResponseBody::Streaming(stream.boxed())
            } else {
                let bytes = match tokio::time::timeout(self.attempt_timeout, response.bytes()).await
                {
                    Ok(Ok(bytes)) => bytes,
                    Ok(Err(e)) => return Err(TransportError::from_reqwest(&e)),
                    Err(_) => {
                        return Err(TransportError::new(
                            TransportErrorKind::Timeout,
                            format!("body from {} not received in time", self.origin),
                        ))
                    }
                };
                drop(permit);
                ResponseBody::Buffered(bytes)
            };

            Ok(UpstreamResponse {
                status,
                headers,
                body,
            })
        })
    }
}

/// Whether a response must be relayed incrementally rather than buffered:
/// chunked transfer, event streams, unknown length, or a declared length
/// above `max_buffered`.
pub fn should_stream(headers: &HeaderMap, max_buffered: usize) -> bool {
    let chunked = headers
        .get_all(header::TRANSFER_ENCODING)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.to_ascii_lowercase().contains("chunked"));
    if chunked {
        return true;
    }

    let event_stream = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("text/event-stream"))
        .unwrap_or(false);
    if event_stream {
        return true;
    }

    match headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<usize>().ok())
    {
        Some(len) => len > max_buffered,
        None => true,
    }
}
