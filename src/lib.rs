// lib.rs - Relay server pieces and the conversation controller
pub mod config;
pub mod conversation;
pub mod gemini_client;
pub mod handlers;
pub mod logging;
pub mod middleware;
pub mod relay;

use axum::{Extension, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

pub use config::{ClientConfig, ConfigError, RelayConfig};
pub use relay::{HttpRelayClient, Modality, ProviderResponse, RelayError, RelayTransport};

/// Shared state handed to every relay handler.
pub struct AppState {
    pub gemini_client: gemini_client::GeminiClient,
}

impl AppState {
    pub fn new(config: &RelayConfig) -> Self {
        Self {
            gemini_client: gemini_client::GeminiClient::new(config),
        }
    }
}

/// Builds the relay application with all routes and shared state.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(handlers::relay::relay_routes())
        .merge(handlers::status::status_routes())
        .route_layer(axum::middleware::from_fn(middleware::logging::request_logging_middleware))
        .layer(CorsLayer::permissive())
        .layer(Extension(state))
}
