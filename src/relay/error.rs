//! Errors surfaced at the relay's endpoint boundary.
//!
//! Only two shapes leave the server: a 400 for missing or malformed input and
//! a generic 500 for anything that went wrong while talking to the model.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Error)]
pub enum RelayError {
    /// Required input missing or unusable. The message is shown to the caller.
    #[error("{0}")]
    Validation(String),
    /// The model call (or reading the upload) failed. The message is a fixed,
    /// endpoint-specific string; the cause is only logged.
    #[error("{0}")]
    Upstream(&'static str),
}

impl RelayError {
    pub fn validation(message: impl Into<String>) -> Self {
        RelayError::Validation(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::Validation(_) => StatusCode::BAD_REQUEST,
            RelayError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
