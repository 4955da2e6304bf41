//! Core domain types: trigger events, tag sets, verdicts, responses.

use serde::{Deserialize, Serialize};

use crate::error::{AntivirusError, Result};
use crate::keys::{decode_object_key, encode_object_key};

// ---------------------------------------------------------------------------
// Trigger event
// ---------------------------------------------------------------------------

/// Object-created notification as delivered by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectCreatedEvent {
    #[serde(rename = "Records", default)]
    pub records: Vec<EventRecord>,
}

/// One record of an object-created notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub s3: S3Entity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Entity {
    pub bucket: BucketEntity,
    pub object: ObjectEntity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketEntity {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectEntity {
    /// Percent-encoded object key.
    pub key: String,
}

/// Bucket and decoded key of the object an event refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    pub bucket: String,
    pub key: String,
}

impl ObjectCreatedEvent {
    /// Build a single-record event for `bucket`/`key`, encoding the key.
    pub fn for_object(bucket: impl Into<String>, key: &str) -> Self {
        Self {
            records: vec![EventRecord {
                s3: S3Entity {
                    bucket: BucketEntity {
                        name: bucket.into(),
                    },
                    object: ObjectEntity {
                        key: encode_object_key(key),
                    },
                },
            }],
        }
    }

    /// Resolve the first record to a bucket and decoded key.
    ///
    /// Later records are ignored.
    pub fn target(&self) -> Result<ObjectRef> {
        let record = self
            .records
            .first()
            .ok_or_else(|| AntivirusError::validation("event contained no records"))?;

        let key = decode_object_key(&record.s3.object.key).map_err(AntivirusError::InvalidKey)?;

        Ok(ObjectRef {
            bucket: record.s3.bucket.name.clone(),
            key,
        })
    }
}

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

/// A single object tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// An object's tags in store order. Duplicate keys are allowed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagSet(pub Vec<Tag>);

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Tag> {
        self.0.iter()
    }
}

impl From<Vec<Tag>> for TagSet {
    fn from(tags: Vec<Tag>) -> Self {
        Self(tags)
    }
}

impl FromIterator<Tag> for TagSet {
    fn from_iter<I: IntoIterator<Item = Tag>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a TagSet {
    type Item = &'a Tag;
    type IntoIter = std::slice::Iter<'a, Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// ---------------------------------------------------------------------------
// Verdict, encryption, response
// ---------------------------------------------------------------------------

/// Outcome of a single scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Clean,
    Infected,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Clean => f.write_str("clean"),
            Self::Infected => f.write_str("infected"),
        }
    }
}

/// At-rest encryption requested for an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encryption {
    None,
    /// Store-managed AES-256 (`AES256`).
    Aes256,
}

/// Result returned to the triggering runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub message: String,
}

impl Response {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVENT_JSON: &str = r#"{
        "Records": [
            {
                "eventName": "ObjectCreated:Put",
                "s3": {
                    "bucket": { "name": "my-bucket", "arn": "arn:aws:s3:::my-bucket" },
                    "object": { "key": "file%2Dkey", "size": 12 }
                }
            },
            {
                "s3": {
                    "bucket": { "name": "other-bucket" },
                    "object": { "key": "ignored" }
                }
            }
        ]
    }"#;

    #[test]
    fn parses_notification_and_uses_first_record() {
        let event: ObjectCreatedEvent = serde_json::from_str(EVENT_JSON).expect("parse");
        assert_eq!(event.records.len(), 2);

        let target = event.target().expect("target");
        assert_eq!(target.bucket, "my-bucket");
        assert_eq!(target.key, "file-key");
    }

    #[test]
    fn empty_event_is_rejected() {
        let event: ObjectCreatedEvent = serde_json::from_str("{}").expect("parse");
        let err = event.target().unwrap_err();
        assert_eq!(err.to_string(), "validation error: event contained no records");
    }

    #[test]
    fn bad_key_is_reported() {
        let mut event = ObjectCreatedEvent::for_object("my-bucket", "x");
        event.records[0].s3.object.key = "bad key%%%".into();
        let err = event.target().unwrap_err();
        assert_eq!(
            err.to_string(),
            "failed to unescape object key: invalid URL escape \"%%%\""
        );
    }

    #[test]
    fn for_object_encodes_key() {
        let event = ObjectCreatedEvent::for_object("b", "dir/my file.txt");
        assert_eq!(event.records[0].s3.object.key, "dir%2Fmy%20file.txt");
        assert_eq!(event.target().unwrap().key, "dir/my file.txt");
    }

    #[test]
    fn response_serializes_message_field() {
        let json = serde_json::to_string(&Response::new("clamav definitions updated")).unwrap();
        assert_eq!(json, r#"{"message":"clamav definitions updated"}"#);
    }
}
