//! In-process [`BlobStore`] for tests and local dry runs.
//!
//! Every call is recorded in order, and failures can be injected per
//! operation and object, so tests can check both what a pipeline wrote and
//! what it never attempted.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use antivirus_shared::{Encryption, StoreError, TagSet};

use crate::{BlobStore, StoreResult};

/// Store operation kinds, used for call logs and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    GetObject,
    PutObject,
    GetTags,
    PutTags,
}

/// One recorded call against the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreCall {
    pub op: StoreOp,
    pub bucket: String,
    pub key: String,
}

#[derive(Debug, Clone)]
struct StoredObject {
    body: Vec<u8>,
    tags: TagSet,
    encryption: Encryption,
}

type ObjectId = (String, String);

#[derive(Debug, Default)]
struct State {
    objects: HashMap<ObjectId, StoredObject>,
    failures: HashMap<(StoreOp, String, String), StoreError>,
    calls: Vec<StoreCall>,
}

/// Thread-safe in-memory object store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

fn id(bucket: &str, key: &str) -> ObjectId {
    (bucket.to_string(), key.to_string())
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed an object with `body` and no tags.
    pub fn with_object(self, bucket: &str, key: &str, body: impl Into<Vec<u8>>) -> Self {
        self.lock().objects.insert(
            id(bucket, key),
            StoredObject {
                body: body.into(),
                tags: TagSet::new(),
                encryption: Encryption::None,
            },
        );
        self
    }

    /// Seed tags on an object, creating an empty object if needed.
    pub fn with_tags(self, bucket: &str, key: &str, tags: TagSet) -> Self {
        self.lock()
            .objects
            .entry(id(bucket, key))
            .or_insert_with(|| StoredObject {
                body: Vec::new(),
                tags: TagSet::new(),
                encryption: Encryption::None,
            })
            .tags = tags;
        self
    }

    /// Make every `op` on `bucket`/`key` fail with `error`.
    pub fn fail(self, op: StoreOp, bucket: &str, key: &str, error: StoreError) -> Self {
        self.lock()
            .failures
            .insert((op, bucket.to_string(), key.to_string()), error);
        self
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.lock()
            .objects
            .get(&id(bucket, key))
            .map(|o| o.body.clone())
    }

    pub fn tags(&self, bucket: &str, key: &str) -> Option<TagSet> {
        self.lock()
            .objects
            .get(&id(bucket, key))
            .map(|o| o.tags.clone())
    }

    /// Encryption requested when the object was last uploaded.
    pub fn encryption(&self, bucket: &str, key: &str) -> Option<Encryption> {
        self.lock()
            .objects
            .get(&id(bucket, key))
            .map(|o| o.encryption)
    }

    /// All calls made so far, oldest first.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock().calls.clone()
    }

    /// Calls of a single kind, oldest first.
    pub fn calls_for(&self, op: StoreOp) -> Vec<StoreCall> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.op == op)
            .cloned()
            .collect()
    }
}

impl State {
    /// Record the call and return the injected failure for it, if any.
    fn enter(&mut self, op: StoreOp, bucket: &str, key: &str) -> StoreResult<()> {
        self.calls.push(StoreCall {
            op,
            bucket: bucket.to_string(),
            key: key.to_string(),
        });
        match self.failures.get(&(op, bucket.to_string(), key.to_string())) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl BlobStore for InMemoryStore {
    async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<Vec<u8>> {
        let mut state = self.lock();
        state.enter(StoreOp::GetObject, bucket, key)?;
        state
            .objects
            .get(&id(bucket, key))
            .map(|o| o.body.clone())
            .ok_or_else(|| StoreError::no_such_key(bucket, key))
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        encryption: Encryption,
    ) -> StoreResult<()> {
        let mut state = self.lock();
        state.enter(StoreOp::PutObject, bucket, key)?;
        state.objects.insert(
            id(bucket, key),
            StoredObject {
                body,
                tags: TagSet::new(),
                encryption,
            },
        );
        Ok(())
    }

    async fn get_tags(&self, bucket: &str, key: &str) -> StoreResult<TagSet> {
        let mut state = self.lock();
        state.enter(StoreOp::GetTags, bucket, key)?;
        state
            .objects
            .get(&id(bucket, key))
            .map(|o| o.tags.clone())
            .ok_or_else(|| StoreError::no_such_key(bucket, key))
    }

    async fn put_tags(&self, bucket: &str, key: &str, tags: &TagSet) -> StoreResult<()> {
        let mut state = self.lock();
        state.enter(StoreOp::PutTags, bucket, key)?;
        match state.objects.get_mut(&id(bucket, key)) {
            Some(object) => {
                object.tags = tags.clone();
                Ok(())
            }
            None => Err(StoreError::no_such_key(bucket, key)),
        }
    }
}

#[cfg(test)]
mod tests {
    use antivirus_shared::Tag;

    use super::*;

    #[tokio::test]
    async fn missing_object_is_no_such_key() {
        let store = InMemoryStore::new();
        let err = store.get_object("b", "k").await.unwrap_err();
        assert!(err.is_no_such_key());

        let err = store.put_tags("b", "k", &TagSet::new()).await.unwrap_err();
        assert!(err.is_no_such_key());
    }

    #[tokio::test]
    async fn put_then_get_object() {
        let store = InMemoryStore::new();
        store
            .put_object("b", "k", b"hello".to_vec(), Encryption::Aes256)
            .await
            .expect("put");

        assert_eq!(store.get_object("b", "k").await.unwrap(), b"hello");
        assert_eq!(store.encryption("b", "k"), Some(Encryption::Aes256));
    }

    #[tokio::test]
    async fn tags_replace_wholesale() {
        let store = InMemoryStore::new().with_tags(
            "b",
            "k",
            TagSet::from(vec![Tag::new("a", "1"), Tag::new("b", "2")]),
        );

        let replacement = TagSet::from(vec![Tag::new("c", "3")]);
        store.put_tags("b", "k", &replacement).await.expect("put tags");
        assert_eq!(store.get_tags("b", "k").await.unwrap(), replacement);
    }

    #[tokio::test]
    async fn injected_failures_and_call_log() {
        let store = InMemoryStore::new()
            .with_object("b", "k", "body")
            .fail(StoreOp::GetTags, "b", "k", StoreError::other("access denied"));

        assert!(store.get_object("b", "k").await.is_ok());
        let err = store.get_tags("b", "k").await.unwrap_err();
        assert_eq!(err, StoreError::other("access denied"));

        let ops: Vec<StoreOp> = store.calls().into_iter().map(|c| c.op).collect();
        assert_eq!(ops, vec![StoreOp::GetObject, StoreOp::GetTags]);
        assert_eq!(store.calls_for(StoreOp::PutTags), vec![]);
    }
}
