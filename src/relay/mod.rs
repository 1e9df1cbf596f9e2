//! HTTP relay between the chat client and the generative model.
//!
//! Every endpoint is stateless: it builds one prompt (optionally with one
//! inline attachment), calls the model once and returns the text reply.

pub mod error;
pub mod handlers;
pub mod upload;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use eyre::Result;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::RelayConfig;
use crate::gemini_client::{GeminiClient, GenerativeModel};
use upload::MAX_UPLOAD_BYTES;

/// Room for multipart boundaries, headers and the prompt field on top of the
/// file itself.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub model: Arc<dyn GenerativeModel>,
    pub upload_dir: PathBuf,
    pub public_dir: PathBuf,
}

pub fn create_router(state: AppState) -> Router {
    let static_files = ServeDir::new(&state.public_dir);

    Router::new()
        .route("/", get(handlers::index))
        .route("/chat", post(handlers::chat))
        .route("/generate-image", post(handlers::generate_image))
        .route("/analyze-image", post(handlers::analyze_image))
        .route("/read-file", post(handlers::read_file))
        .fallback_service(static_files)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + MULTIPART_OVERHEAD))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(config: RelayConfig) -> Result<()> {
    let state = AppState {
        model: Arc::new(GeminiClient::new(&config.gemini)),
        upload_dir: config.upload_dir.clone(),
        public_dir: config.public_dir.clone(),
    };
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        model = %config.gemini.model,
        "🚀 PikaBot running at http://localhost:{}",
        config.port
    );

    axum::serve(listener, app).await?;
    Ok(())
}
