// src/gemini_client.rs
use crate::config::RelayConfig;
use crate::relay::{Modality, RelayError};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    text_model: String,
    image_model: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(untagged)]
pub enum Part {
    Text { text: String },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    // functionCall, executableCode and friends; never requested here
    Other(Value),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct InlineData {
    #[serde(rename = "mimeType", default = "default_image_mime")]
    pub mime_type: String,
    pub data: String, // base64 encoded data
}

fn default_image_mime() -> String {
    "image/png".to_string()
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(rename = "responseModalities")]
    pub response_modalities: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(rename = "usageMetadata")]
    pub usage_metadata: Option<UsageMetadata>,
    #[serde(rename = "promptFeedback")]
    pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Candidate {
    pub content: Option<Content>,
    #[serde(rename = "finishReason")]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PromptFeedback {
    #[serde(rename = "blockReason")]
    pub block_reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UsageMetadata {
    #[serde(rename = "promptTokenCount", default)]
    pub prompt_token_count: u32,
    #[serde(rename = "candidatesTokenCount", default)]
    pub candidates_token_count: u32,
    #[serde(rename = "totalTokenCount", default)]
    pub total_token_count: u32,
}

impl GenerateContentRequest {
    /// Wraps a prompt in the payload shape the given modality expects.
    pub fn for_prompt(prompt: &str, modality: Modality) -> Self {
        match modality {
            Modality::Text => Self {
                contents: vec![Content {
                    parts: vec![Part::Text {
                        text: prompt.to_string(),
                    }],
                    role: Some("user".to_string()),
                }],
                generation_config: None,
            },
            Modality::Image => Self {
                contents: vec![Content {
                    parts: vec![Part::Text {
                        text: prompt.to_string(),
                    }],
                    role: None,
                }],
                generation_config: Some(GenerationConfig {
                    response_modalities: vec!["TEXT".to_string(), "IMAGE".to_string()],
                }),
            },
        }
    }
}

impl GeminiClient {
    pub fn new(config: &RelayConfig) -> Self {
        Self {
            client: Client::new(),
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            text_model: config.text_model.clone(),
            image_model: config.image_model.clone(),
        }
    }

    pub fn model_for(&self, modality: Modality) -> &str {
        match modality {
            Modality::Text => &self.text_model,
            Modality::Image => &self.image_model,
        }
    }

    /// Forwards a prompt to `generateContent` once and returns the provider
    /// body untouched.
    pub async fn generate_content(&self, prompt: &str, modality: Modality) -> Result<Value, RelayError> {
        let model = self.model_for(modality);
        let url = format!("{}/models/{}:generateContent", self.base_url, model);
        let request = GenerateContentRequest::for_prompt(prompt, modality);

        tracing::debug!(model = %model, modality = %modality, prompt_chars = prompt.len(), "forwarding prompt to Gemini");

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| RelayError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| RelayError::Transport(e.without_url().to_string()))?;

        if !status.is_success() {
            tracing::error!(status = status.as_u16(), model = %model, "Google API Error: {}", response_text);
            return Err(RelayError::Upstream {
                status: status.as_u16(),
                message: format!("Google API Error: {}", response_text),
            });
        }

        tracing::debug!("Gemini API response (truncated): {}...", truncate(&response_text, 500));

        let body: Value = serde_json::from_str(&response_text).map_err(|parse_error| {
            tracing::error!("Failed to parse Gemini response: {}", parse_error);
            RelayError::Decode(format!("error decoding response body: {}", parse_error))
        })?;

        if let Some(total) = body.pointer("/usageMetadata/totalTokenCount").and_then(Value::as_u64) {
            tracing::info!(model = %model, total_tokens = total, "Gemini call completed");
        }

        Ok(body)
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
