use thiserror::Error;

use super::attachment::AttachmentError;
use super::store::StoreError;
use super::voice::VoiceError;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("an exchange is already in progress")]
    Busy,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Attachment(#[from] AttachmentError),
    #[error(transparent)]
    Voice(#[from] VoiceError),
    #[error("failed to serialize conversation: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("invalid formatting pattern: {0}")]
    Format(#[from] regex::Error),
}
