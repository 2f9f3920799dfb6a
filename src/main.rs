use std::sync::Arc;
use vidscript::{app, logging, AppState, RelayConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    logging::init_logging(logging::server_directives())?;

    tracing::info!("🎬 VidScript relay starting up...");
    tracing::info!("Version: {}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Build mode: {}", if cfg!(debug_assertions) { "development" } else { "production" });

    // The credential is required for every relay call, so refuse to start without it
    let config = match RelayConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Configuration error: {}", e);
            tracing::info!("Set GOOGLE_API_KEY in the environment or in a .env file");
            return Err(e.into());
        }
    };

    tracing::info!(
        "Configuration - text model: {}, image model: {}, upstream: {}",
        config.text_model,
        config.image_model,
        config.base_url
    );

    let shared_state = Arc::new(AppState::new(&config));
    let app = app(shared_state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("✅ Server is running on http://{}", listener.local_addr()?);
    axum::serve(listener, app.into_make_service_with_connect_info::<std::net::SocketAddr>()).await?;

    Ok(())
}
