use axum::{
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::enrichment::EnrichmentClient;
use crate::marketo_client::MarketoClient;
use crate::webhook_handler;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// OpenAI enrichment client with the per-company result cache.
    pub enrichment: EnrichmentClient,
    /// Marketo REST client with the shared token cache.
    pub marketo: MarketoClient,
}

/// Builds the application router. Kept separate from startup so tests can
/// drive the real routing table without binding a socket.
pub fn build_router(state: Arc<AppState>) -> Router {
    let webhook_routes = Router::new()
        .route("/webhook", post(webhook_handler::marketo_webhook))
        .layer(
            ServiceBuilder::new()
                // Request size limit: 5MB max payload
                .layer(RequestBodyLimitLayer::new(5 * 1024 * 1024)),
        );

    // Liveness and health stay outside the body-limited group so platform
    // probes are never throttled.
    Router::new()
        .route("/", get(home))
        .route("/health", get(health))
        .merge(webhook_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// GET /
///
/// Plain-text liveness line. Marketo pings this when a webhook is saved in
/// its admin UI, so the body stays human-readable.
pub async fn home() -> &'static str {
    "Marketo Webhook is running!"
}

/// Health check endpoint.
///
/// Returns the service status, version, and health information.
///
/// # Returns
///
/// * `(StatusCode, Json<serde_json::Value>)` - HTTP 200 OK with health status JSON.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "rust-marketo-api",
            "version": "0.1.0"
        })),
    )
}
