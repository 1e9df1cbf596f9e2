use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, error};

use crate::config::GeminiConfig;

/// Binary content sent inline alongside a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineData {
    /// Declared MIME type, e.g. `image/png`
    pub mime_type: String,
    /// Base64-encoded payload
    pub data: String,
}

#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("request to Gemini API failed: {0}")]
    Transport(reqwest::Error),
    #[error("Gemini API returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("Gemini API response contained no text")]
    EmptyResponse,
}

/// A text-generating model. Each call is stateless: one prompt, at most one
/// inline attachment, one text completion.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    async fn generate_content(
        &self,
        prompt: &str,
        attachment: Option<InlineData>,
    ) -> Result<String, GeminiError>;
}

const API_KEY_HEADER: &str = "x-goog-api-key";

pub struct GeminiClient {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(config: &GeminiConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: config.api_base.clone(),
            client: reqwest::Client::new(),
        }
    }

    // Never carries the key; that goes in `API_KEY_HEADER`.
    fn api_url(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

fn transport(e: reqwest::Error) -> GeminiError {
    GeminiError::Transport(e.without_url())
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    async fn generate_content(
        &self,
        prompt: &str,
        attachment: Option<InlineData>,
    ) -> Result<String, GeminiError> {
        let request_body = build_request_body(prompt, attachment.as_ref());

        debug!(
            model = %self.model,
            prompt_chars = prompt.chars().count(),
            has_attachment = attachment.is_some(),
            "Sending request to Gemini API"
        );

        let response = self
            .client
            .post(self.api_url())
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.map_err(transport)?;
            error!("API request failed with status {}: {}", status, body);
            return Err(GeminiError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let response_json: Value = response.json().await.map_err(transport)?;
        extract_text(&response_json)
    }
}

fn build_request_body(prompt: &str, attachment: Option<&InlineData>) -> Value {
    let mut parts = vec![json!({ "text": prompt })];

    if let Some(inline) = attachment {
        parts.push(json!({
            "inlineData": {
                "mimeType": inline.mime_type,
                "data": inline.data
            }
        }));
    }

    json!({
        "contents": [
            {
                "role": "user",
                "parts": parts
            }
        ]
    })
}

/// Joins the text parts of the first candidate.
fn extract_text(response_json: &Value) -> Result<String, GeminiError> {
    let parts = response_json
        .get("candidates")
        .and_then(|candidates| candidates.as_array())
        .and_then(|candidates| candidates.first())
        .and_then(|candidate| candidate.get("content"))
        .and_then(|content| content.get("parts"))
        .and_then(|parts| parts.as_array())
        .ok_or(GeminiError::EmptyResponse)?;

    let text: String = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
        .collect();

    if text.is_empty() {
        return Err(GeminiError::EmptyResponse);
    }

    Ok(text)
}
