// src/handlers/status.rs
use crate::relay::Modality;
use crate::AppState;
use axum::{extract::Extension, routing::get, Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;

pub fn status_routes() -> Router {
    Router::new().route("/api/status", get(api_status))
}

async fn api_status(Extension(state): Extension<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "operational",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "models": {
            "text": state.gemini_client.model_for(Modality::Text),
            "image": state.gemini_client.model_for(Modality::Image)
        },
        "endpoints": {
            "text": ["/api/generateText", "/api/generateScript", "/api/generateHashtags"],
            "image": ["/api/generateImageWithGemini"]
        }
    }))
}
