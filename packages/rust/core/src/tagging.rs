//! Status tag merge and write-back.

use tracing::debug;

use antivirus_shared::{AntivirusError, Result, Tag, TagSet};
use antivirus_storage::BlobStore;

/// Set `status_key` to `status_value` in `tags`.
///
/// The first tag with a matching key is updated in place. Any later
/// duplicates are left alone. If no tag matches, one is appended. Other
/// tags keep their position and value.
pub fn merge_status(tags: &mut TagSet, status_key: &str, status_value: &str) {
    match tags.0.iter_mut().find(|t| t.key == status_key) {
        Some(tag) => tag.value = status_value.to_string(),
        None => tags.0.push(Tag::new(status_key, status_value)),
    }
}

/// Read the object's tags, merge the status tag in, and write the whole set back.
///
/// Returns the set that was written.
pub async fn apply_status_tag(
    store: &dyn BlobStore,
    bucket: &str,
    key: &str,
    status_key: &str,
    status_value: &str,
) -> Result<TagSet> {
    let mut tags = store
        .get_tags(bucket, key)
        .await
        .map_err(AntivirusError::GetTags)?;

    merge_status(&mut tags, status_key, status_value);

    store
        .put_tags(bucket, key, &tags)
        .await
        .map_err(AntivirusError::PutTags)?;

    debug!(bucket, key, tags = tags.len(), "status tag written");
    Ok(tags)
}
