use std::io;
use std::path::{Path, PathBuf};

use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::warn;
use uuid::Uuid;

/// A payload written to a uniquely named temporary file for upload.
///
/// Call [`remove`](Self::remove) once the upload is done. Dropping the value
/// without it removes the file synchronously as a fallback, for paths that
/// never reach `remove` (cancelled or timed-out calls).
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    name: String,
    removed: bool,
}

impl StagedFile {
    /// Write `data` to a new file under `dir`, named by a random UUID.
    pub async fn write(dir: &Path, data: &[u8]) -> io::Result<Self> {
        let name = Uuid::new_v4().to_string();
        let path = dir.join(&name);

        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        options.mode(0o644);

        // From here on the file exists; dropping `staged` removes it on error.
        let mut file = options.open(&path).await?;
        let staged = Self {
            path,
            name,
            removed: false,
        };
        file.write_all(data).await?;
        file.flush().await?;
        Ok(staged)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name, also used as the pin name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Delete the file without blocking the runtime.
    pub async fn remove(mut self) {
        self.removed = true;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove staged file"),
        }
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove staged file"),
        }
    }
}
