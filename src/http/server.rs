//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the engine, auth gate and connection manager from config
//! - Create the Axum router: `/health`, the protected prefix, a 404 fallback
//! - Wire up middleware (request ID, tracing, body limit, CORS)
//! - Serve on a listener until shutdown is signalled
//!
//! # Design Decisions
//! - The auth gate is a route layer, so `/health` and the fallback are
//!   never authenticated
//! - The request deadline lives in the engine, not in a layer, so running
//!   out of time yields the same JSON error as any other upstream failure

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{any, get},
    Json, Router,
};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::auth::{auth_middleware, AuthGate, TokenRegistry};
use crate::config::ProxyConfig;
use crate::http::handlers::{health, proxy_handler};
use crate::http::request::MakeCorrelationId;
use crate::proxy::{ProxyEngine, ProxyError};
use crate::upstream::{ConnectionManager, TransportSettings};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ProxyEngine>,
    pub max_body_size: usize,
}

/// HTTP server for the proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    gate: Arc<AuthGate>,
}

impl HttpServer {
    /// Create a server with its own pooled connection manager.
    pub fn new(config: ProxyConfig) -> Result<Self, ProxyError> {
        let connections = Arc::new(ConnectionManager::new(TransportSettings::from_config(&config)));
        Self::with_connections(config, connections)
    }

    /// Create a server that dispatches through `connections`.
    pub fn with_connections(
        config: ProxyConfig,
        connections: Arc<ConnectionManager>,
    ) -> Result<Self, ProxyError> {
        let engine = Arc::new(ProxyEngine::from_config(&config, connections)?);

        let gate = Arc::new(if config.auth.required {
            AuthGate::new(Arc::new(TokenRegistry::new(config.auth.tokens.clone())))
        } else {
            AuthGate::disabled()
        });

        let state = AppState {
            engine,
            max_body_size: config.security.max_body_size,
        };

        let router = Self::build_router(&config, state, gate.clone());
        Ok(Self {
            router,
            config,
            gate,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &ProxyConfig, state: AppState, gate: Arc<AuthGate>) -> Router {
        let prefix = config.auth.prefix.trim_end_matches('/');

        let proxied: Router<AppState> = if prefix.is_empty() {
            Router::new()
                .route("/", any(proxy_handler))
                .route("/{*path}", any(proxy_handler))
        } else {
            Router::new()
                .route(prefix, any(proxy_handler))
                .route(&format!("{}/", prefix), any(proxy_handler))
                .route(&format!("{}/{{*path}}", prefix), any(proxy_handler))
        };
        let proxied = proxied.route_layer(middleware::from_fn_with_state(gate, auth_middleware));

        let router = Router::new()
            .route("/health", get(health))
            .merge(proxied)
            .fallback(not_found)
            .with_state(state)
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeCorrelationId));

        if config.security.cors_enabled {
            router.layer(CorsLayer::permissive())
        } else {
            router
        }
    }

    /// Router with every layer applied, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn into_router(self) -> Router {
        self.router
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.url,
            prefix = %self.config.auth.prefix,
            auth_required = self.gate.is_required(),
            tokens = self.gate.registry().len(),
            "HTTP server starting"
        );
        if self.gate.is_required() {
            let principals = self.gate.registry().principals();
            tracing::info!(
                count = principals.len(),
                principals = %principals.join(", "),
                "Loaded API tokens"
            );
        }

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" })))
}
