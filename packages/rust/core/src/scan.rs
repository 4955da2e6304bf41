//! Scan pipeline: one object-created event in, one status tag out.
//!
//! Stages, in order:
//! 1. Decode the event's first record into a bucket and key
//! 2. Download the object into a scratch file
//! 3. Scan the scratch file
//! 4. Merge the status tag into the object's tags and write them back
//!
//! Any failure ends the event; later stages never run. The scratch file is
//! removed on every path once it exists.

use std::fmt;
use std::io;
use std::path::Path;
use std::sync::Arc;

use tracing::{info, instrument, warn};

use antivirus_engine::Scanner;
use antivirus_shared::{
    AntivirusError, ObjectCreatedEvent, Response, Result, ScanConfig, StoreError,
};
use antivirus_storage::BlobStore;

use crate::definitions::fetch_all;
use crate::scratch::ScratchFile;
use crate::tagging::apply_status_tag;

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

/// The last stage an event completed. Logged when an event fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStage {
    Start,
    Downloaded,
    Scanned,
    Tagged,
    Done,
}

impl fmt::Display for ScanStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::Downloaded => "downloaded",
            Self::Scanned => "scanned",
            Self::Tagged => "tagged",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// A body that cannot be written locally is a failed download.
fn scratch_write_failed(path: &Path, err: io::Error) -> AntivirusError {
    AntivirusError::Download(StoreError::other(format!(
        "write {}: {err}",
        path.display()
    )))
}

/// Scans newly created objects and tags them with the verdict.
pub struct ScanPipeline {
    config: ScanConfig,
    store: Arc<dyn BlobStore>,
    scanner: Arc<dyn Scanner>,
}

impl ScanPipeline {
    pub fn new(config: ScanConfig, store: Arc<dyn BlobStore>, scanner: Arc<dyn Scanner>) -> Self {
        Self {
            config,
            store,
            scanner,
        }
    }

    /// Cold-start preparation: fetch definitions, then start the engine daemon.
    ///
    /// Both steps are best effort. Failures are logged and the pipeline still
    /// accepts events.
    #[instrument(skip_all)]
    pub async fn warm_up(&self) {
        let defs = &self.config.definitions;

        if defs.bucket.is_empty() {
            warn!("no definitions bucket configured, skipping definitions download");
        } else {
            info!(bucket = %defs.bucket, "downloading virus definitions");
            match fetch_all(self.store.as_ref(), &defs.dir, &defs.bucket, &defs.files).await {
                Ok(summary) => info!(fetched = summary.fetched, "virus definitions downloaded"),
                Err(e) => warn!(error = %e, "downloading new definitions failed"),
            }
        }

        if let Err(e) = self.scanner.start_daemon().await {
            warn!(error = %e, "error starting daemon");
        }
    }

    /// Scan the object named by `event` and tag it with the result.
    #[instrument(skip_all)]
    pub async fn handle_event(&self, event: &ObjectCreatedEvent) -> Result<Response> {
        let mut stage = ScanStage::Start;
        let result = self.run(event, &mut stage).await;

        if let Err(e) = &result {
            warn!(%stage, error = %e, "scan failed");
        }
        result
    }

    async fn run(&self, event: &ObjectCreatedEvent, stage: &mut ScanStage) -> Result<Response> {
        let target = event.target()?;
        let (bucket, key) = (target.bucket.as_str(), target.key.as_str());

        let scratch = ScratchFile::create_in(&self.config.scratch_dir)?;

        info!(bucket, key, "downloading file");
        let body = self
            .store
            .get_object(bucket, key)
            .await
            .map_err(AntivirusError::Download)?;
        scratch
            .write_all(&body)
            .await
            .map_err(|e| scratch_write_failed(scratch.path(), e))?;
        *stage = ScanStage::Downloaded;

        info!(bucket, key, bytes = body.len(), "file downloaded, scanning file");
        let verdict = self.scanner.scan_file(scratch.path()).await?;
        *stage = ScanStage::Scanned;

        let status = self.config.tag_values.for_verdict(verdict);
        info!(bucket, key, %verdict, status, "scan complete, tagging file");
        apply_status_tag(
            self.store.as_ref(),
            bucket,
            key,
            &self.config.tag_key,
            status,
        )
        .await?;
        *stage = ScanStage::Tagged;

        let message = format!("scanning complete, tagged with {status}");
        info!(bucket, key, "{message}");
        *stage = ScanStage::Done;

        Ok(Response::new(message))
    }
}
