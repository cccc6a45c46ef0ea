//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize subsystems in dependency order
//! - Report the effective configuration without leaking secrets
//! - Bind the listener and serve until a shutdown signal
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listeners start last (traffic only when ready)

use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::ProxyConfig;
use crate::http::HttpServer;
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::spawn_signal_listener;
use crate::observability::{init_metrics, mask_secret};
use crate::proxy::ProxyError;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Proxy(#[from] ProxyError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    #[error("invalid metrics address {0}")]
    MetricsAddress(String),

    #[error("failed to start metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Log what the proxy is about to do.
pub fn log_summary(config: &ProxyConfig) {
    let credential = config
        .upstream
        .credential
        .as_deref()
        .map(mask_secret)
        .unwrap_or_else(|| "none".to_string());

    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.url,
        credential = %credential,
        prefix = %config.auth.prefix,
        auth_required = config.auth.required,
        max_attempts = config.retries.max_attempts,
        retry_delay_ms = config.retries.delay_ms,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );
}

/// Build the server, bind, and serve until SIGINT/SIGTERM.
pub async fn run(config: ProxyConfig) -> Result<(), StartupError> {
    log_summary(&config);

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|_| StartupError::MetricsAddress(config.observability.metrics_address.clone()))?;
        init_metrics(addr)?;
    }

    let server = HttpServer::new(config)?;

    let address = server.config().listener.bind_address.clone();
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| StartupError::Bind { address, source })?;

    let shutdown = Shutdown::new();
    let shutdown_rx = shutdown.subscribe();
    spawn_signal_listener(shutdown);

    server.run(listener, shutdown_rx).await?;
    tracing::info!("Shutdown complete");
    Ok(())
}
