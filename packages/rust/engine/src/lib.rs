//! Scan and update engine ports, plus the ClamAV process adapter.
//!
//! The pipelines only see [`Scanner`] and [`Updater`]; [`ClamAv`] shells out
//! to the ClamAV binaries and maps their exit codes.

mod clamav;

use std::path::Path;

use async_trait::async_trait;

use antivirus_shared::{Result, Verdict};

pub use clamav::ClamAv;

/// Scans local files.
#[async_trait]
pub trait Scanner: Send + Sync {
    /// Warm the engine up. Called once per process, before the first scan.
    async fn start_daemon(&self) -> Result<()>;

    /// Scan one file. An infected file is a verdict, not an error.
    async fn scan_file(&self, path: &Path) -> Result<Verdict>;
}

/// Refreshes the signature database in place.
#[async_trait]
pub trait Updater: Send + Sync {
    async fn run_update(&self) -> Result<()>;
}
