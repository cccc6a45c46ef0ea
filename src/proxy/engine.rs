//! Proxy engine.
//!
//! # Responsibilities
//! - Turn an authenticated inbound request into an upstream exchange
//! - Drive the retry state machine around transport dispatch
//! - Produce a terminal [`ProxyError`] when no response can be obtained
//!
//! # Data Flow
//! ```text
//! InboundRequest
//!     → build_outbound (rewrite path, strip hop-by-hop, inject credential)
//!     → ConnectionManager::acquire (shared transport for the origin)
//!     → loop { begin_attempt → dispatch → delivered | failed → sleep }
//!     → UpstreamResponse | ProxyError::Upstream
//! ```
//!
//! # Design Decisions
//! - The outbound request is built once; each attempt replays a clone
//! - Any upstream status, 5xx included, counts as delivered
//! - Once a response is delivered no further attempt is possible, so a
//!   partially streamed body is never replayed
//! - One deadline covers every attempt and retry delay; running out of it is
//!   an `ETIMEDOUT` upstream error carrying the attempts made so far

use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderValue;
use url::Url;

use crate::config::{ProxyConfig, TimeoutConfig};
use crate::observability::metrics;
use crate::proxy::error::ProxyError;
use crate::proxy::request::{bearer_credential, build_outbound, InboundRequest};
use crate::proxy::rewrite::PathRewrite;
use crate::resilience::retries::{RetryDecision, RetryPolicy, RetryState};
use crate::upstream::{
    ConnectionManager, Origin, TransportError, TransportErrorKind, UpstreamResponse,
};

/// Forwards requests to a single upstream.
#[derive(Debug, Clone)]
pub struct ProxyEngine {
    connections: Arc<ConnectionManager>,
    upstream: Url,
    origin: Origin,
    rewrite: PathRewrite,
    credential: Option<HeaderValue>,
    retry: RetryPolicy,
    request_timeout: Duration,
}

impl ProxyEngine {
    /// Engine for `upstream` with no rewrite, no credential and the default
    /// retry policy and request deadline.
    pub fn new(upstream: Url, connections: Arc<ConnectionManager>) -> Result<Self, ProxyError> {
        let origin = Origin::from_url(&upstream).ok_or_else(|| {
            ProxyError::Config(format!("upstream URL {} has no usable origin", upstream))
        })?;

        Ok(Self {
            connections,
            upstream,
            origin,
            rewrite: PathRewrite::None,
            credential: None,
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(TimeoutConfig::default().request_secs),
        })
    }

    pub fn from_config(
        config: &ProxyConfig,
        connections: Arc<ConnectionManager>,
    ) -> Result<Self, ProxyError> {
        let upstream = Url::parse(&config.upstream.url)
            .map_err(|e| ProxyError::Config(format!("upstream.url: {}", e)))?;

        let credential = config
            .upstream
            .credential
            .as_deref()
            .filter(|token| !token.is_empty())
            .map(bearer_credential)
            .transpose()?;

        Ok(Self::new(upstream, connections)?
            .with_rewrite(PathRewrite::from_config(&config.rewrite))
            .with_credential(credential)
            .with_retry(RetryPolicy::from_config(&config.retries))
            .with_request_timeout(Duration::from_secs(config.timeouts.request_secs)))
    }

    pub fn with_rewrite(mut self, rewrite: PathRewrite) -> Self {
        self.rewrite = rewrite;
        self
    }

    pub fn with_credential(mut self, credential: Option<HeaderValue>) -> Self {
        self.credential = credential;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn upstream(&self) -> &Url {
        &self.upstream
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Forward `inbound` and return the upstream's response.
    ///
    /// Transient transport failures are retried within the retry policy.
    /// Upstream error statuses are returned as responses, not errors.
    /// The whole exchange, retries included, must produce response headers
    /// before the request deadline.
    pub async fn forward(&self, inbound: InboundRequest) -> Result<UpstreamResponse, ProxyError> {
        let outbound = build_outbound(
            &inbound,
            &self.upstream,
            &self.rewrite,
            self.credential.as_ref(),
        )?;

        let transport = self
            .connections
            .acquire(&self.origin)
            .map_err(|source| ProxyError::Upstream {
                source,
                attempts: 0,
                retried: false,
            })?;

        let deadline = tokio::time::Instant::now() + self.request_timeout;
        let mut state = RetryState::new(self.retry);

        while let Some(attempt) = state.begin_attempt() {
            tracing::debug!(
                request_id = %inbound.correlation_id,
                method = %outbound.method,
                url = %outbound.url,
                attempt,
                "Dispatching to upstream"
            );

            let dispatched =
                tokio::time::timeout_at(deadline, transport.dispatch(outbound.clone())).await;
            let error = match dispatched {
                Ok(Ok(response)) => {
                    state.delivered();
                    if state.retried() {
                        tracing::info!(
                            request_id = %inbound.correlation_id,
                            attempt,
                            status = response.status.as_u16(),
                            "Upstream recovered after retry"
                        );
                    }
                    return Ok(response);
                }
                Ok(Err(error)) => error,
                Err(_) => self.deadline_error(),
            };

            match state.failed(error.kind()) {
                RetryDecision::Retry { delay } => {
                    if tokio::time::Instant::now() + delay >= deadline {
                        let error = self.deadline_error();
                        state.failed(error.kind());
                        return Err(self.give_up(&inbound, &state, error));
                    }
                    tracing::warn!(
                        request_id = %inbound.correlation_id,
                        attempt,
                        code = error.code(),
                        error = %error,
                        delay_ms = delay.as_millis() as u64,
                        "Transient upstream failure, retrying"
                    );
                    metrics::record_retry();
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::GiveUp => return Err(self.give_up(&inbound, &state, error)),
            }
        }

        // begin_attempt only refuses after a terminal transition, and every
        // terminal transition above returns.
        debug_assert!(state.is_terminal());
        Err(ProxyError::Config(format!(
            "retry state ended in {:?} without an outcome",
            state.phase()
        )))
    }

    fn deadline_error(&self) -> TransportError {
        TransportError::new(
            TransportErrorKind::Timeout,
            format!("no upstream response within {:?}", self.request_timeout),
        )
    }

    fn give_up(
        &self,
        inbound: &InboundRequest,
        state: &RetryState,
        error: TransportError,
    ) -> ProxyError {
        tracing::error!(
            request_id = %inbound.correlation_id,
            attempts = state.attempt(),
            code = error.code(),
            error = %error,
            "Upstream request failed"
        );
        metrics::record_upstream_error(error.code());
        ProxyError::Upstream {
            source: error,
            attempts: state.attempt(),
            retried: state.retried(),
        }
    }
}
