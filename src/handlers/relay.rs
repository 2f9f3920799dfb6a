// src/handlers/relay.rs
use crate::relay::{Modality, RelayError, RelayRequest};
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, Extension},
    routing::post,
    Json, Router,
};
use serde_json::Value;
use std::sync::Arc;

pub fn relay_routes() -> Router {
    Router::new()
        .route("/api/generateText", post(generate_text))
        // serverless-era aliases, same text relay
        .route("/api/generateScript", post(generate_text))
        .route("/api/generateHashtags", post(generate_text))
        .route("/api/generateImageWithGemini", post(generate_image))
}

async fn generate_text(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<RelayRequest>, JsonRejection>,
) -> Result<Json<Value>, RelayError> {
    relay(&state, payload, Modality::Text).await
}

async fn generate_image(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<RelayRequest>, JsonRejection>,
) -> Result<Json<Value>, RelayError> {
    relay(&state, payload, Modality::Image).await
}

async fn relay(
    state: &AppState,
    payload: Result<Json<RelayRequest>, JsonRejection>,
    modality: Modality,
) -> Result<Json<Value>, RelayError> {
    let Json(request) = payload.map_err(|rejection| RelayError::InvalidInput(rejection.body_text()))?;

    if request.prompt.trim().is_empty() {
        return Err(RelayError::InvalidInput("prompt must not be empty".to_string()));
    }

    tracing::info!(modality = %modality, "Received request for Gemini {} generation", modality);

    match state.gemini_client.generate_content(&request.prompt, modality).await {
        Ok(body) => Ok(Json(body)),
        Err(e) => {
            tracing::error!(modality = %modality, error = %e, "relay call failed");
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::RelayConfig;
    use crate::relay::{HttpRelayClient, Modality, RelayError, RelayTransport};
    use crate::{app, AppState};
    use axum::{
        extract::{Path, Query, State},
        http::StatusCode,
        response::{IntoResponse, Response},
        routing::post,
        Json, Router,
    };
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Debug, Clone)]
    struct SeenRequest {
        model_action: String,
        key: Option<String>,
        body: Value,
    }

    #[derive(Clone)]
    struct FakeGemini {
        status: StatusCode,
        body: String,
        seen: Arc<Mutex<Vec<SeenRequest>>>,
    }

    async fn fake_generate(
        State(fake): State<FakeGemini>,
        Path(model_action): Path<String>,
        Query(query): Query<HashMap<String, String>>,
        Json(body): Json<Value>,
    ) -> Response {
        fake.seen.lock().await.push(SeenRequest {
            model_action,
            key: query.get("key").cloned(),
            body,
        });
        (fake.status, fake.body.clone()).into_response()
    }

    async fn spawn(router: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    fn config_for(base_url: String) -> RelayConfig {
        RelayConfig::from_lookup(|name| match name {
            "GOOGLE_API_KEY" => Some("test-key".to_string()),
            "GEMINI_BASE_URL" => Some(base_url.clone()),
            "BIND_ADDR" => Some("127.0.0.1:0".to_string()),
            _ => None,
        })
        .unwrap()
    }

    /// Starts a fake provider answering with `status`/`body`, and a relay
    /// server pointed at it. Returns the relay base URL and the provider log.
    async fn relay_against(status: StatusCode, body: &str) -> (String, Arc<Mutex<Vec<SeenRequest>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let fake = FakeGemini {
            status,
            body: body.to_string(),
            seen: seen.clone(),
        };
        let upstream = spawn(
            Router::new()
                .route("/v1beta/models/:model_action", post(fake_generate))
                .with_state(fake),
        )
        .await;

        let config = config_for(format!("http://{}/v1beta", upstream));
        let relay = spawn(app(Arc::new(AppState::new(&config)))).await;
        (format!("http://{}", relay), seen)
    }

    async fn post_prompt(base: &str, path: &str, body: Value) -> (StatusCode, Value) {
        let response = reqwest::Client::new()
            .post(format!("{}{}", base, path))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = response.status();
        (status, response.json::<Value>().await.unwrap())
    }

    #[tokio::test]
    async fn test_text_relay_passes_provider_body_through() {
        let provider_body = json!({
            "candidates": [{ "content": { "parts": [{ "text": "INTRO..." }], "role": "model" } }],
            "modelVersion": "whatever-the-provider-says"
        });
        let (base, seen) = relay_against(StatusCode::OK, &provider_body.to_string()).await;

        let (status, body) = post_prompt(&base, "/api/generateText", json!({ "prompt": "write it" })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, provider_body);

        let seen = seen.lock().await;
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].model_action, "gemini-2.5-flash-preview-05-20:generateContent");
        assert_eq!(seen[0].key.as_deref(), Some("test-key"));
        assert_eq!(
            seen[0].body,
            json!({ "contents": [{ "role": "user", "parts": [{ "text": "write it" }] }] })
        );
    }

    #[tokio::test]
    async fn test_script_and_hashtag_aliases_use_text_model() {
        let (base, seen) = relay_against(StatusCode::OK, "{}").await;

        for path in ["/api/generateScript", "/api/generateHashtags"] {
            let (status, _) = post_prompt(&base, path, json!({ "prompt": "p" })).await;
            assert_eq!(status, StatusCode::OK);
        }

        let seen = seen.lock().await;
        assert_eq!(seen.len(), 2);
        assert!(seen.iter().all(|r| r.model_action.starts_with("gemini-2.5-flash-preview-05-20")));
    }

    #[tokio::test]
    async fn test_image_relay_requests_image_modality() {
        let (base, seen) = relay_against(StatusCode::OK, r#"{"candidates":[]}"#).await;

        let (status, _) = post_prompt(&base, "/api/generateImageWithGemini", json!({ "prompt": "thumb" })).await;
        assert_eq!(status, StatusCode::OK);

        let seen = seen.lock().await;
        assert_eq!(seen[0].model_action, "gemini-2.0-flash-preview-image-generation:generateContent");
        assert_eq!(seen[0].body["generationConfig"]["responseModalities"], json!(["TEXT", "IMAGE"]));
    }

    #[tokio::test]
    async fn test_upstream_failure_keeps_status_and_text() {
        let (base, _) = relay_against(StatusCode::TOO_MANY_REQUESTS, "quota exhausted").await;

        let (status, body) = post_prompt(&base, "/api/generateText", json!({ "prompt": "p" })).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body, json!({ "error": "Google API Error: quota exhausted" }));
    }

    #[tokio::test]
    async fn test_empty_or_malformed_prompt_rejected_before_upstream() {
        let (base, seen) = relay_against(StatusCode::OK, "{}").await;

        let (status, body) = post_prompt(&base, "/api/generateText", json!({ "prompt": "  " })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("prompt"));

        let (status, body) = post_prompt(&base, "/api/generateText", json!({ "text": "wrong field" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        assert!(seen.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_unparseable_provider_body_is_server_error() {
        let (base, _) = relay_against(StatusCode::OK, "<html>oops</html>").await;

        let (status, body) = post_prompt(&base, "/api/generateText", json!({ "prompt": "p" })).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().starts_with("Server error:"));
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_server_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dead = listener.local_addr().unwrap();
        drop(listener);

        let config = config_for(format!("http://{}/v1beta", dead));
        let relay = spawn(app(Arc::new(AppState::new(&config)))).await;

        let (status, body) = post_prompt(&format!("http://{}", relay), "/api/generateText", json!({ "prompt": "p" })).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().starts_with("Server error:"));
        assert!(!body["error"].as_str().unwrap().contains("test-key"));
    }

    #[tokio::test]
    async fn test_http_client_surfaces_upstream_error() {
        let (base, _) = relay_against(StatusCode::FORBIDDEN, "API key not valid").await;
        let client = HttpRelayClient::new(base);

        let err = client.relay("p", Modality::Text).await.unwrap_err();
        assert_eq!(
            err,
            RelayError::Upstream {
                status: 403,
                message: "Google API Error: API key not valid".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_http_client_returns_provider_response() {
        let provider_body = json!({
            "candidates": [{ "content": { "parts": [{ "inlineData": { "mimeType": "image/png", "data": "iVBORw0KGgo=" } }] } }]
        });
        let (base, _) = relay_against(StatusCode::OK, &provider_body.to_string()).await;
        let client = HttpRelayClient::new(format!("{}/", base));

        let response = client.relay("thumb", Modality::Image).await.unwrap();
        assert_eq!(response.inline_image().unwrap().data, "iVBORw0KGgo=");
        assert_eq!(response.into_inner(), provider_body);
    }
}
