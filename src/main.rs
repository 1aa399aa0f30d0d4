//! Steer Chat - turn-taking server for a PC-steered chat model
//!
//! Hosts any number of conversations, decides who speaks next in each, and
//! drives a stateless generation backend that writes both sides.

mod api;
mod conversation;
mod generation;
mod runtime;
mod state_machine;
mod steering;

use api::{create_router, AppState};
use generation::{BackendConfig, Generator, HttpGenerator, LoggingGenerator};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "steer_chat=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let backend_config = BackendConfig::from_env()?;

    let port: u16 = std::env::var("STEER_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);

    // Generation backend
    let http = HttpGenerator::new(backend_config)?;
    tracing::info!(backend = %http.base_url(), "Using generation backend");
    let generator: Arc<dyn Generator> = Arc::new(LoggingGenerator::new(http));

    match generator.health().await {
        Ok(health) if health.model_loaded => {
            tracing::info!(status = %health.status, "Generation backend ready");
        }
        Ok(health) => {
            tracing::warn!(status = %health.status, "Generation backend up but model not loaded");
        }
        // Not fatal: the backend may come up after us
        Err(e) => tracing::warn!(error = %e, "Generation backend not reachable"),
    }

    // Create application state
    let state = AppState::new(generator);

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Steer Chat server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
