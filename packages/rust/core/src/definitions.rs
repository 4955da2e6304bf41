//! Moves definition files between the definitions bucket and a local directory.
//!
//! Both directions are sequential and stop at the first failure. Fetching
//! treats a missing object as "nothing published yet" and stops early
//! without error; pushing treats every local file as required.

use std::path::Path;

use tracing::{debug, info, instrument};

use antivirus_shared::{AntivirusError, Encryption, Result};
use antivirus_storage::BlobStore;

/// What [`fetch_all`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchSummary {
    /// Files written locally.
    pub fetched: usize,
    /// The file that was not in the bucket, if fetching stopped early.
    pub missing: Option<String>,
}

/// Download each of `file_names` from `bucket` into `destination_dir`.
///
/// Local copies are overwritten. If an object does not exist, returns
/// successfully without trying the remaining names. Any other failure is
/// returned as is; files written before it stay on disk.
#[instrument(skip_all, fields(bucket = %bucket, dir = %destination_dir.display()))]
pub async fn fetch_all(
    store: &dyn BlobStore,
    destination_dir: &Path,
    bucket: &str,
    file_names: &[String],
) -> Result<FetchSummary> {
    tokio::fs::create_dir_all(destination_dir)
        .await
        .map_err(|e| AntivirusError::io(destination_dir, e))?;

    let mut summary = FetchSummary::default();

    for name in file_names {
        let body = match store.get_object(bucket, name).await {
            Ok(body) => body,
            Err(err) if err.is_no_such_key() => {
                info!(file = %name, "definition file not published yet, stopping fetch");
                summary.missing = Some(name.clone());
                return Ok(summary);
            }
            Err(err) => return Err(err.into()),
        };

        let path = destination_dir.join(name);
        tokio::fs::write(&path, &body)
            .await
            .map_err(|e| AntivirusError::io(&path, e))?;

        debug!(file = %name, bytes = body.len(), "definition file fetched");
        summary.fetched += 1;
    }

    Ok(summary)
}

/// Upload each of `file_names` from `destination_dir` to `bucket`, encrypted at rest.
///
/// Every local file must exist. Stops at the first missing file or failed
/// upload. Returns the number of files uploaded.
#[instrument(skip_all, fields(bucket = %bucket, dir = %destination_dir.display()))]
pub async fn push_all(
    store: &dyn BlobStore,
    destination_dir: &Path,
    bucket: &str,
    file_names: &[String],
) -> Result<usize> {
    let mut pushed = 0;

    for name in file_names {
        let path = destination_dir.join(name);
        let body = tokio::fs::read(&path)
            .await
            .map_err(|e| AntivirusError::io(&path, e))?;
        let len = body.len();

        store
            .put_object(bucket, name, body, Encryption::Aes256)
            .await?;

        debug!(file = %name, bytes = len, "definition file pushed");
        pushed += 1;
    }

    Ok(pushed)
}
