use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::debug;
use url::Url;

use super::attachment::PendingAttachment;

/// Shown when a successful response carries neither `reply` nor `message`.
pub const NO_REPLY_TEXT: &str = "I apologize, but I couldn't process that request.";

/// One request to the relay, chosen by what the user staged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeRequest {
    Text { message: String },
    Image { prompt: String, attachment: PendingAttachment },
    Document { prompt: String, attachment: PendingAttachment },
}

impl ExchangeRequest {
    pub fn endpoint(&self) -> &'static str {
        match self {
            ExchangeRequest::Text { .. } => "chat",
            ExchangeRequest::Image { .. } => "analyze-image",
            ExchangeRequest::Document { .. } => "read-file",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RelayReply {
    #[serde(default)]
    pub reply: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl RelayReply {
    pub fn text(reply: impl Into<String>) -> Self {
        Self {
            reply: Some(reply.into()),
            message: None,
        }
    }

    /// `reply`, else `message`, else a fixed apology.
    pub fn into_text(self) -> String {
        self.reply
            .filter(|r| !r.is_empty())
            .or(self.message.filter(|m| !m.is_empty()))
            .unwrap_or_else(|| NO_REPLY_TEXT.to_string())
    }
}

#[derive(Debug, Error)]
pub enum RelayClientError {
    #[error("relay request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("relay responded with status {0}")]
    Status(u16),
    #[error("invalid relay url: {0}")]
    Url(#[from] url::ParseError),
}

#[async_trait]
pub trait RelayApi: Send + Sync {
    async fn exchange(&self, request: ExchangeRequest) -> Result<RelayReply, RelayClientError>;
}

pub struct HttpRelayClient {
    base: Url,
    client: reqwest::Client,
}

impl HttpRelayClient {
    pub fn new(base: &str) -> Result<Self, RelayClientError> {
        // Without a trailing slash `join` would replace the last path segment.
        let base = if base.ends_with('/') {
            Url::parse(base)?
        } else {
            Url::parse(&format!("{base}/"))?
        };
        Ok(Self {
            base,
            client: reqwest::Client::new(),
        })
    }

    pub fn endpoint_url(&self, request: &ExchangeRequest) -> Result<Url, RelayClientError> {
        Ok(self.base.join(request.endpoint())?)
    }
}

fn upload_form(prompt: String, field: &'static str, attachment: PendingAttachment) -> Result<Form, RelayClientError> {
    let part = Part::bytes(attachment.bytes)
        .file_name(attachment.name)
        .mime_str(&attachment.mime_type)?;
    Ok(Form::new().text("prompt", prompt).part(field, part))
}

#[async_trait]
impl RelayApi for HttpRelayClient {
    async fn exchange(&self, request: ExchangeRequest) -> Result<RelayReply, RelayClientError> {
        let url = self.endpoint_url(&request)?;
        debug!("Sending exchange to {}", url);

        let builder = match request {
            ExchangeRequest::Text { message } => {
                self.client.post(url).json(&json!({ "message": message }))
            }
            ExchangeRequest::Image { prompt, attachment } => self
                .client
                .post(url)
                .multipart(upload_form(prompt, "image", attachment)?),
            ExchangeRequest::Document { prompt, attachment } => self
                .client
                .post(url)
                .multipart(upload_form(prompt, "file", attachment)?),
        };

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RelayClientError::Status(status.as_u16()));
        }

        Ok(response.json().await?)
    }
}
