mod buckets;
mod config;
mod enrichment;
mod errors;
mod handlers;
mod marketo_client;
mod webhook_handler;
mod webhook_models;

use moka::future::Cache;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::enrichment::EnrichmentClient;
use crate::marketo_client::MarketoClient;

/// Main entry point for the application.
///
/// This function initializes the application, including:
/// - Logging and tracing.
/// - Configuration loading.
/// - The per-company enrichment cache.
/// - The OpenAI and Marketo clients.
/// - HTTP routes and middleware (CORS, body size limit).
///
/// It then starts the Axum server.
///
/// # Returns
///
/// * `anyhow::Result<()>` - Ok if the server runs successfully, or an error if initialization fails.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rust_marketo_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    // Per-company enrichment cache. No TTL: a company enriched once keeps
    // that result for the process lifetime, capped at 100k entries.
    let company_cache = Cache::builder().max_capacity(100_000).build();
    tracing::info!("Company enrichment cache initialized (100k capacity)");

    // Initialize OpenAI enrichment client
    let enrichment = match EnrichmentClient::new(&config, company_cache) {
        Ok(client) => {
            tracing::info!(
                "✓ OpenAI enrichment client initialized: {}",
                config.openai_base_url
            );
            client
        }
        Err(e) => anyhow::bail!("Failed to initialize OpenAI client: {}", e),
    };

    // Initialize Marketo REST client
    let marketo = match MarketoClient::new(&config) {
        Ok(client) => {
            tracing::info!("✓ Marketo client initialized: {}", config.marketo_base_url);
            client
        }
        Err(e) => anyhow::bail!("Failed to initialize Marketo client: {}", e),
    };

    let port = config.port;

    // Build application state
    let app_state = Arc::new(handlers::AppState {
        config,
        enrichment,
        marketo,
    });

    let app = handlers::build_router(app_state);

    // Start server
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
