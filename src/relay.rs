// src/relay.rs
//! The relay contract shared by the HTTP server and the chat client.
//!
//! A relay call takes a prompt and a [`Modality`], forwards it to the
//! provider exactly once, and hands back the provider body as-is. Pulling
//! text or images out of that body is the caller's job, see
//! [`ProviderResponse`].

use crate::gemini_client::{GenerateContentResponse, Part};
use async_trait::async_trait;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

/// Kind of content requested from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Image,
}

impl Modality {
    /// Relay endpoint the client posts to for this modality.
    pub fn endpoint(&self) -> &'static str {
        match self {
            Modality::Text => "/api/generateText",
            Modality::Image => "/api/generateImageWithGemini",
        }
    }
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Image => write!(f, "image"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RelayError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("{message}")]
    Upstream { status: u16, message: String },
    #[error("{0}")]
    Transport(String),
    #[error("{0}")]
    Decode(String),
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            RelayError::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            RelayError::Transport(_) | RelayError::Decode(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            RelayError::Transport(msg) | RelayError::Decode(msg) => format!("Server error: {}", msg),
            other => other.to_string(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Body accepted by every relay endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct RelayRequest {
    pub prompt: String,
}

/// Inline image pulled out of a provider response.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: String,
}

/// Raw provider body as relayed by the server.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderResponse(pub Value);

impl ProviderResponse {
    pub fn into_inner(self) -> Value {
        self.0
    }

    fn parsed(&self) -> Option<GenerateContentResponse> {
        serde_json::from_value(self.0.clone()).ok()
    }

    /// Text of the first part of the first candidate, if that part is text.
    pub fn first_text(&self) -> Option<String> {
        let parsed = self.parsed()?;
        let content = parsed.candidates.into_iter().next()?.content?;
        match content.parts.into_iter().next()? {
            Part::Text { text } => Some(text),
            _ => None,
        }
    }

    /// First inline-data part of the first candidate.
    pub fn inline_image(&self) -> Option<InlineImage> {
        let parsed = self.parsed()?;
        let content = parsed.candidates.into_iter().next()?.content?;
        content.parts.into_iter().find_map(|part| match part {
            Part::InlineData { inline_data } => Some(InlineImage {
                mime_type: inline_data.mime_type,
                data: inline_data.data,
            }),
            _ => None,
        })
    }
}

/// The seam between the conversation controller and whatever delivers
/// prompts to the relay.
#[async_trait]
pub trait RelayTransport: Send + Sync {
    async fn relay(&self, prompt: &str, modality: Modality) -> Result<ProviderResponse, RelayError>;
}

/// Talks to a running relay server over HTTP.
#[derive(Debug, Clone)]
pub struct HttpRelayClient {
    client: Client,
    base_url: String,
}

impl HttpRelayClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl RelayTransport for HttpRelayClient {
    async fn relay(&self, prompt: &str, modality: Modality) -> Result<ProviderResponse, RelayError> {
        let url = format!("{}{}", self.base_url, modality.endpoint());

        let response = self
            .client
            .post(&url)
            .json(&RelayRequest {
                prompt: prompt.to_string(),
            })
            .send()
            .await
            .map_err(|e| RelayError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<Value>()
                .await
                .ok()
                .and_then(|body| body.get("error").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_else(|| format!("API Error: {}", status.as_u16()));
            return Err(RelayError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let body = response
            .json::<Value>()
            .await
            .map_err(|e| RelayError::Decode(e.to_string()))?;
        Ok(ProviderResponse(body))
    }
}
