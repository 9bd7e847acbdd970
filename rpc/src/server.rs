//! Axum-based RPC server.

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokentrust_lifecycle::TokenLifecycle;
use tokentrust_types::Timestamp;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::RpcError;
use crate::handlers;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub lifecycle: Arc<TokenLifecycle>,
    /// `None` disables `GET /metrics`.
    pub registry: Option<prometheus::Registry>,
    pub started_at: Timestamp,
}

impl AppState {
    pub fn new(lifecycle: Arc<TokenLifecycle>) -> Self {
        let started_at = lifecycle.now();
        Self {
            lifecycle,
            registry: None,
            started_at,
        }
    }

    pub fn with_registry(mut self, registry: prometheus::Registry) -> Self {
        self.registry = Some(registry);
        self
    }
}

pub struct RpcServer {
    pub port: u16,
    state: AppState,
}

impl RpcServer {
    pub fn new(port: u16, state: AppState) -> Self {
        Self { port, state }
    }

    /// The full route table, with CORS and request tracing layers.
    pub fn router(&self) -> Router {
        router(self.state.clone())
    }

    /// Serve until any message arrives on `shutdown`.
    pub async fn start<S>(&self, mut shutdown: broadcast::Receiver<S>) -> Result<(), RpcError>
    where
        S: Clone + Send + 'static,
    {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!("RPC server listening on {}", addr);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;
        info!("RPC server stopped");
        Ok(())
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/tokens",
            post(handlers::issue_token).get(handlers::list_tokens),
        )
        .route("/token/:id/status", get(handlers::token_status))
        .route("/token/:id/events", get(handlers::token_events))
        .route("/token/:id/freeze", post(handlers::freeze_token))
        .route("/token/:id/unfreeze", post(handlers::unfreeze_token))
        .route("/token/:id/revoke", post(handlers::revoke_token))
        .route("/analyze", post(handlers::analyze))
        .route("/analyze/oracle", post(handlers::analyze_with_oracle))
        .route("/verify", post(handlers::verify))
        .route("/triage", post(handlers::triage))
        .route("/event/:id", get(handlers::event))
        .route("/audit/:target", get(handlers::audit))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
