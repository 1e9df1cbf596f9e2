use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use tracing::{debug, warn};

/// Largest upload accepted by the image and document endpoints.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

static UPLOAD_COUNTER: AtomicU64 = AtomicU64::new(0);

/// An uploaded file staged on local disk for the duration of one request.
///
/// The file is removed when the guard is dropped, so every exit path of a
/// handler (success, validation failure, read failure, upstream failure)
/// releases it.
#[derive(Debug)]
pub struct TempUpload {
    path: PathBuf,
}

impl TempUpload {
    /// Writes `bytes` to a fresh file under `dir`, creating `dir` if needed.
    pub async fn store(dir: &Path, bytes: &[u8]) -> io::Result<Self> {
        tokio::fs::create_dir_all(dir).await?;

        let name = format!(
            "{}-{}-{}",
            Utc::now().format("%Y%m%d%H%M%S%f"),
            std::process::id(),
            UPLOAD_COUNTER.fetch_add(1, Ordering::Relaxed)
        );
        // Guard exists before the write so a partial file is still removed.
        let upload = Self {
            path: dir.join(name),
        };
        tokio::fs::write(&upload.path, bytes).await?;
        debug!("Stored upload at {} ({} bytes)", upload.path.display(), bytes.len());

        Ok(upload)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn read_bytes(&self) -> io::Result<Vec<u8>> {
        tokio::fs::read(&self.path).await
    }

    /// Fails with `InvalidData` when the content is not UTF-8.
    pub async fn read_text(&self) -> io::Result<String> {
        tokio::fs::read_to_string(&self.path).await
    }
}

impl Drop for TempUpload {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed upload {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove upload {}: {}", self.path.display(), e),
        }
    }
}
