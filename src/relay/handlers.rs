use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::error::RelayError;
use super::upload::{TempUpload, MAX_UPLOAD_BYTES};
use super::AppState;
use crate::gemini_client::InlineData;

pub const DEFAULT_IMAGE_PROMPT: &str = "Describe this image in detail";
pub const DEFAULT_DOCUMENT_PROMPT: &str = "Analyze this document";

/// Prefix of a document forwarded to the model, in characters.
pub const MAX_DOCUMENT_CHARS: usize = 30_000;

const CHAT_FAILED: &str = "Error generating response";
const IMAGE_FAILED: &str = "Error analyzing image";
const DOCUMENT_FAILED: &str = "Error reading file. Make sure it's a text file.";
const FALLBACK_MIME: &str = "application/octet-stream";

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateImageRequest {
    #[serde(default)]
    pub prompt: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReplyBody {
    pub reply: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct NoticeBody {
    pub message: String,
    pub suggestion: String,
}

pub async fn index(State(state): State<AppState>) -> Response {
    let path = state.public_dir.join("index.html");
    match tokio::fs::read_to_string(&path).await {
        Ok(html) => (
            StatusCode::OK,
            [
                (header::CACHE_CONTROL, "no-cache, no-store"),
                (header::EXPIRES, "-1"),
            ],
            Html(html),
        )
            .into_response(),
        Err(e) => {
            warn!("Could not read {}: {}", path.display(), e);
            (StatusCode::NOT_FOUND, Html("Not Found".to_string())).into_response()
        }
    }
}

pub async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ReplyBody>, RelayError> {
    let message = payload
        .ok()
        .and_then(|Json(request)| request.message)
        .filter(|message| !message.trim().is_empty())
        .ok_or_else(|| RelayError::validation("Message is required"))?;

    let reply = state
        .model
        .generate_content(&message, None)
        .await
        .map_err(|e| {
            error!("Chat error: {}", e);
            RelayError::Upstream(CHAT_FAILED)
        })?;

    Ok(Json(ReplyBody { reply }))
}

pub async fn generate_image(
    payload: Result<Json<GenerateImageRequest>, JsonRejection>,
) -> Result<Json<NoticeBody>, RelayError> {
    let prompt = payload
        .ok()
        .and_then(|Json(request)| request.prompt)
        .filter(|prompt| !prompt.trim().is_empty())
        .ok_or_else(|| RelayError::validation("Prompt is required"))?;

    info!("Image generation requested ({} chars), not supported", prompt.chars().count());

    Ok(Json(NoticeBody {
        message: "Image generation requires additional API integration (DALL-E, Stable Diffusion, etc.)"
            .to_string(),
        suggestion: "I can help describe images or analyze them instead!".to_string(),
    }))
}

pub async fn analyze_image(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ReplyBody>, RelayError> {
    let form = read_upload_form(multipart, "image").await?;
    let file = form
        .file
        .ok_or_else(|| RelayError::validation("Image is required"))?;
    let prompt = form
        .prompt
        .unwrap_or_else(|| DEFAULT_IMAGE_PROMPT.to_string());

    let upload = TempUpload::store(&state.upload_dir, &file.bytes)
        .await
        .map_err(|e| upstream("Image analysis", IMAGE_FAILED, e))?;

    let image_data = upload
        .read_bytes()
        .await
        .map_err(|e| upstream("Image analysis", IMAGE_FAILED, e))?;
    let inline = InlineData {
        mime_type: file.content_type.unwrap_or_else(|| FALLBACK_MIME.to_string()),
        data: BASE64.encode(image_data),
    };

    let reply = state
        .model
        .generate_content(&prompt, Some(inline))
        .await
        .map_err(|e| upstream("Image analysis", IMAGE_FAILED, e))?;

    Ok(Json(ReplyBody { reply }))
}

pub async fn read_file(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ReplyBody>, RelayError> {
    let form = read_upload_form(multipart, "file").await?;
    let file = form
        .file
        .ok_or_else(|| RelayError::validation("File is required"))?;
    let prompt = form
        .prompt
        .unwrap_or_else(|| DEFAULT_DOCUMENT_PROMPT.to_string());

    let upload = TempUpload::store(&state.upload_dir, &file.bytes)
        .await
        .map_err(|e| upstream("File reading", DOCUMENT_FAILED, e))?;

    let content = upload
        .read_text()
        .await
        .map_err(|e| upstream("File reading", DOCUMENT_FAILED, e))?;

    let reply = state
        .model
        .generate_content(&document_prompt(&prompt, &content), None)
        .await
        .map_err(|e| upstream("File reading", DOCUMENT_FAILED, e))?;

    Ok(Json(ReplyBody { reply }))
}

/// Combines the caller's prompt with a bounded prefix of the document.
pub fn document_prompt(prompt: &str, content: &str) -> String {
    let truncated: String = content.chars().take(MAX_DOCUMENT_CHARS).collect();
    format!("{prompt}\n\nDocument content:\n{truncated}")
}

fn upstream(context: &str, public: &'static str, cause: impl std::fmt::Display) -> RelayError {
    error!("{} error: {}", context, cause);
    RelayError::Upstream(public)
}

#[derive(Debug, Default)]
struct UploadForm {
    prompt: Option<String>,
    file: Option<UploadedFile>,
}

#[derive(Debug)]
struct UploadedFile {
    content_type: Option<String>,
    bytes: axum::body::Bytes,
}

async fn read_upload_form(
    multipart: Result<Multipart, MultipartRejection>,
    file_field: &str,
) -> Result<UploadForm, RelayError> {
    let mut multipart = multipart.map_err(invalid_upload)?;
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await.map_err(invalid_upload)? {
        let name = field.name().unwrap_or_default().to_string();

        if name == "prompt" {
            let prompt = field.text().await.map_err(invalid_upload)?;
            // An empty prompt means "use the default".
            form.prompt = Some(prompt).filter(|p| !p.is_empty());
        } else if name == file_field {
            let content_type = field.content_type().map(str::to_string);
            let bytes = field.bytes().await.map_err(invalid_upload)?;
            if bytes.len() > MAX_UPLOAD_BYTES {
                return Err(RelayError::validation("File too large (max 10MB)"));
            }
            form.file = Some(UploadedFile {
                content_type,
                bytes,
            });
        }
    }

    Ok(form)
}

fn invalid_upload(e: impl std::fmt::Display) -> RelayError {
    warn!("Rejected multipart upload: {}", e);
    RelayError::validation("Invalid upload")
}
