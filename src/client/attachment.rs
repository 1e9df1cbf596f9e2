use std::fmt;
use std::path::{Path, PathBuf};

use mime::Mime;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Image,
    Document,
}

impl fmt::Display for AttachmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttachmentKind::Image => write!(f, "image"),
            AttachmentKind::Document => write!(f, "file"),
        }
    }
}

#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Please select a valid image file ({name} is {mime})")]
    NotAnImage { name: String, mime: String },
}

/// The single file or image staged for the next exchange.
#[derive(Clone, PartialEq, Eq)]
pub struct PendingAttachment {
    pub kind: AttachmentKind,
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for PendingAttachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingAttachment")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl PendingAttachment {
    /// Builds an attachment, rejecting non-image content for `Image`.
    pub fn new(
        kind: AttachmentKind,
        name: impl Into<String>,
        mime_type: Mime,
        bytes: Vec<u8>,
    ) -> Result<Self, AttachmentError> {
        let name = name.into();
        if kind == AttachmentKind::Image && mime_type.type_() != mime::IMAGE {
            return Err(AttachmentError::NotAnImage {
                name,
                mime: mime_type.to_string(),
            });
        }
        Ok(Self {
            kind,
            name,
            mime_type: mime_type.essence_str().to_string(),
            bytes,
        })
    }

    pub async fn from_path(kind: AttachmentKind, path: &Path) -> Result<Self, AttachmentError> {
        let mime_type = mime_for_path(path);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        // Check the type before reading a possibly large file.
        if kind == AttachmentKind::Image && mime_type.type_() != mime::IMAGE {
            return Err(AttachmentError::NotAnImage {
                name,
                mime: mime_type.to_string(),
            });
        }

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| AttachmentError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        Self::new(kind, name, mime_type, bytes)
    }
}

/// Guesses a MIME type from the file extension.
pub fn mime_for_path(path: &Path) -> Mime {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    let essence = match extension.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        Some("svg") => "image/svg+xml",
        Some("txt") | Some("log") => "text/plain",
        Some("md") => "text/markdown",
        Some("csv") => "text/csv",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    };

    essence.parse().unwrap_or(mime::APPLICATION_OCTET_STREAM)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guesses_common_types() {
        assert_eq!(mime_for_path(Path::new("cat.PNG")), mime::IMAGE_PNG);
        assert_eq!(mime_for_path(Path::new("a/b.jpeg")), mime::IMAGE_JPEG);
        assert_eq!(mime_for_path(Path::new("notes.txt")), mime::TEXT_PLAIN);
        assert_eq!(
            mime_for_path(Path::new("archive")),
            mime::APPLICATION_OCTET_STREAM
        );
    }

    #[test]
    fn image_kind_requires_image_mime() {
        let err = PendingAttachment::new(
            AttachmentKind::Image,
            "notes.txt",
            mime::TEXT_PLAIN,
            b"hi".to_vec(),
        )
        .unwrap_err();
        assert!(matches!(err, AttachmentError::NotAnImage { .. }));
    }

    #[test]
    fn document_accepts_anything() {
        let doc = PendingAttachment::new(
            AttachmentKind::Document,
            "blob.bin",
            mime::APPLICATION_OCTET_STREAM,
            vec![1, 2, 3],
        )
        .unwrap();
        assert_eq!(doc.mime_type, "application/octet-stream");
    }

    #[tokio::test]
    async fn loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.png");
        std::fs::write(&path, [0x89, b'P', b'N', b'G']).unwrap();

        let image = PendingAttachment::from_path(AttachmentKind::Image, &path)
            .await
            .unwrap();
        assert_eq!(image.name, "photo.png");
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.bytes.len(), 4);
    }

    #[tokio::test]
    async fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = PendingAttachment::from_path(AttachmentKind::Document, &dir.path().join("nope.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, AttachmentError::Read { .. }));
    }
}
