//! Staged upload files
//!
//! Uploads are written to `temp_{uuid}_{filename}` and removed after
//! processing whether or not ingestion succeeded.

use raga_common::Result;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// Removal attempts before giving up
pub const REMOVE_ATTEMPTS: u32 = 5;

/// Pause between removal attempts
pub const REMOVE_RETRY_DELAY: Duration = Duration::from_millis(200);

/// Unique staging path for an uploaded file
pub fn staging_path(dir: &Path, filename: &str) -> PathBuf {
    // Keep only the final path component of client-supplied names
    let name = Path::new(filename)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());

    dir.join(format!("temp_{}_{}", Uuid::new_v4(), name))
}

/// Write an upload to a fresh staging file
pub async fn stage_upload(dir: &Path, filename: &str, bytes: &[u8]) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = staging_path(dir, filename);
    tokio::fs::write(&path, bytes).await?;
    debug!(path = %path.display(), size = bytes.len(), "Upload staged");
    Ok(path)
}

/// Delete `path`, retrying while the file is busy.
///
/// Returns whether the file is gone. Failure is logged, never raised.
pub async fn remove_with_retry(path: &Path, attempts: u32, delay: Duration) -> bool {
    for attempt in 1..=attempts.max(1) {
        match tokio::fs::remove_file(path).await {
            Ok(()) => return true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return true,
            Err(e) => {
                if attempt == attempts.max(1) {
                    warn!(path = %path.display(), error = %e, "Could not delete staged file");
                    return false;
                }
                debug!(path = %path.display(), attempt, error = %e, "Delete failed, retrying");
                tokio::time::sleep(delay).await;
            }
        }
    }
    false
}
