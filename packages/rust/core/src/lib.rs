//! Pipelines for the S3 antivirus service.
//!
//! [`ScanPipeline`] scans newly created objects and tags them with the
//! verdict. [`DefinitionSync`] keeps the shared definitions bucket current.
//! Both talk to the outside world only through the storage and engine ports.

pub mod definitions;
pub mod scan;
pub mod scratch;
pub mod sync;
pub mod tagging;

#[cfg(test)]
mod testing;

pub use definitions::{FetchSummary, fetch_all, push_all};
pub use scan::{ScanPipeline, ScanStage};
pub use sync::{DefinitionSync, SYNC_COMPLETE_MESSAGE};
pub use tagging::{apply_status_tag, merge_status};
