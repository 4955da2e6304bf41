//! Blob store access for s3-antivirus.
//!
//! The [`BlobStore`] trait is the only view of object storage the pipelines
//! have. Two implementations ship with the crate:
//! - [`S3Store`]: AWS S3 or any S3-compatible endpoint, via `aws-sdk-s3`
//! - [`InMemoryStore`]: an in-process fake for tests and dry runs

mod memory;
mod s3;

use async_trait::async_trait;

use antivirus_shared::{Encryption, StoreError, TagSet};

pub use memory::{InMemoryStore, StoreCall, StoreOp};
pub use s3::S3Store;

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Object operations used by the scan and sync pipelines.
///
/// Implementations must report a missing object as
/// [`StoreError::NoSuchKey`] so callers can tell absence from failure.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Download the whole body of `bucket`/`key`.
    async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<Vec<u8>>;

    /// Upload `body` as `bucket`/`key`, replacing any existing object.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        encryption: Encryption,
    ) -> StoreResult<()>;

    /// Fetch the tag set of `bucket`/`key`.
    async fn get_tags(&self, bucket: &str, key: &str) -> StoreResult<TagSet>;

    /// Replace the whole tag set of `bucket`/`key`.
    async fn put_tags(&self, bucket: &str, key: &str, tags: &TagSet) -> StoreResult<()>;
}
