//! Definitions sync: pull the published files, refresh them, push them back.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use antivirus_engine::Updater;
use antivirus_shared::{DefinitionsConfig, Response, Result};
use antivirus_storage::BlobStore;

use crate::definitions::{fetch_all, push_all};

/// Message returned when a sync run completes.
pub const SYNC_COMPLETE_MESSAGE: &str = "clamav definitions updated";

/// Keeps the definitions bucket current.
pub struct DefinitionSync {
    config: DefinitionsConfig,
    store: Arc<dyn BlobStore>,
    updater: Arc<dyn Updater>,
}

impl DefinitionSync {
    pub fn new(
        config: DefinitionsConfig,
        store: Arc<dyn BlobStore>,
        updater: Arc<dyn Updater>,
    ) -> Self {
        Self {
            config,
            store,
            updater,
        }
    }

    /// Run one sync: fetch, update, push. Stops at the first failing step.
    ///
    /// Fetching seeds the updater with the last published files so it only
    /// downloads differences. On a first run nothing is published yet, which
    /// is not an error.
    #[instrument(skip_all, fields(bucket = %self.config.bucket))]
    pub async fn handle(&self) -> Result<Response> {
        let cfg = &self.config;

        info!("downloading previous definitions");
        let fetched = fetch_all(self.store.as_ref(), &cfg.dir, &cfg.bucket, &cfg.files)
            .await
            .inspect_err(|e| warn!(error = %e, "downloading definitions failed"))?;
        info!(fetched = fetched.fetched, "previous definitions downloaded");

        info!("updating definitions");
        self.updater
            .run_update()
            .await
            .inspect_err(|e| warn!(error = %e, "updating definitions failed"))?;

        info!("uploading definitions");
        let pushed = push_all(self.store.as_ref(), &cfg.dir, &cfg.bucket, &cfg.files)
            .await
            .inspect_err(|e| warn!(error = %e, "uploading definitions failed"))?;

        info!(pushed, "{SYNC_COMPLETE_MESSAGE}");
        Ok(Response::new(SYNC_COMPLETE_MESSAGE))
    }
}
