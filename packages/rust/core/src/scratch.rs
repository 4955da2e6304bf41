//! Scratch file holding a downloaded object while it is scanned.

use std::io;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use antivirus_shared::{AntivirusError, Result};

/// A uniquely named file that is closed and deleted when dropped.
///
/// Removal failures are logged, never returned, so cleanup cannot change
/// the outcome of the scan that used the file.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
    file: Option<NamedTempFile>,
}

impl ScratchFile {
    /// Create an empty scratch file under `dir`.
    pub fn create_in(dir: &Path) -> Result<Self> {
        let file = tempfile::Builder::new()
            .prefix("scan-")
            .tempfile_in(dir)
            .map_err(AntivirusError::ScratchFile)?;

        let path = file.path().to_path_buf();
        debug!(path = %path.display(), "scratch file created");
        Ok(Self {
            path,
            file: Some(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `bytes` and flush, so an external scanner sees the full body.
    pub async fn write_all(&self, bytes: &[u8]) -> io::Result<()> {
        let Some(file) = self.file.as_ref() else {
            return Ok(());
        };
        let mut handle = tokio::fs::File::from_std(file.as_file().try_clone()?);
        handle.write_all(bytes).await?;
        handle.flush().await
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        let Some(file) = self.file.take() else {
            return;
        };
        match file.close() {
            Ok(()) => debug!(path = %self.path.display(), "scratch file removed"),
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove scratch file"),
        }
    }
}
