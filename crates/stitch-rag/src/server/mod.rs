//! HTTP server

pub mod routes;
pub mod state;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use std::net::SocketAddr;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::error::{Error, Result};
use state::AppState;

/// HTTP server wrapping the shared [`AppState`]
pub struct RagServer {
    config: AppConfig,
    state: AppState,
}

impl RagServer {
    /// Build every configured service and the server around them
    pub async fn new(config: AppConfig) -> Result<Self> {
        let state = AppState::from_config(config.clone()).await?;
        Ok(Self { config, state })
    }

    /// Server over prebuilt state
    pub fn with_state(state: AppState) -> Self {
        Self {
            config: state.config().clone(),
            state,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Router with every endpoint and middleware layer
    pub fn build_router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Serve until Ctrl-C
    pub async fn start(self) -> Result<()> {
        let addr: SocketAddr = self
            .address()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid address {}: {}", self.address(), e)))?;

        let router = self.build_router();
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Config(format!("Failed to bind {}: {}", addr, e)))?;

        tracing::info!("Listening on http://{}", addr);

        let state = self.state.clone();
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!("Failed to listen for shutdown signal: {}", e);
                }
                tracing::info!("Shutdown requested, draining connections");
                state.set_ready(false);
            })
            .await
            .map_err(|e| Error::Internal(format!("Server error: {}", e)))?;

        tracing::info!("Server stopped");
        Ok(())
    }

    /// `host:port` the server binds to
    pub fn address(&self) -> String {
        format!("{}:{}", self.config.server.host, self.config.server.port)
    }
}

/// Build the full router for `state`
pub fn build_router(state: AppState) -> Router {
    let server = &state.config().server;

    let mut router = Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness))
        .merge(routes::api_routes(server.max_upload_size))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(server.request_timeout_secs),
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new());

    if server.enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        router = router.layer(cors);
    }

    router.with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Readiness: every backend answers its health check
async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    if !state.is_ready() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "ready": false })),
        );
    }

    let services = &state.services().rag;
    let (embedder, vector_store, llm, documents, objects) = tokio::join!(
        services.embedder.health_check(),
        services.vector_store.health_check(),
        services.llm.health_check(),
        services.document_store.health_check(),
        state.object_store().health_check(),
    );

    let healthy = |r: Result<bool>| r.unwrap_or(false);
    let checks = serde_json::json!({
        "embeddings": healthy(embedder),
        "vector_store": healthy(vector_store),
        "llm": healthy(llm),
        "document_store": healthy(documents),
        "object_store": healthy(objects),
    });
    let ready = checks
        .as_object()
        .map(|m| m.values().all(|v| v.as_bool() == Some(true)))
        .unwrap_or(false);

    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(serde_json::json!({ "ready": ready, "checks": checks })))
}
