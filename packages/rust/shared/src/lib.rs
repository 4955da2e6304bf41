//! Shared types, error model, and configuration for s3-antivirus.
//!
//! This crate is the foundation depended on by all other s3-antivirus crates.
//! It provides:
//! - [`AntivirusError`] and [`StoreError`]: the unified error types
//! - Domain types ([`ObjectCreatedEvent`], [`TagSet`], [`Verdict`], [`Response`])
//! - Object key decoding ([`decode_object_key`])
//! - Configuration ([`AppConfig`], [`ScanConfig`], config loading)

pub mod config;
pub mod error;
pub mod keys;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DEFAULT_DEFINITION_FILES, DefinitionsConfig, EngineConfig, EngineMode, ScanConfig,
    ScanSettings, StoreConfig, TagValues, init_config, load_config, load_config_from,
    validate_scan, validate_store, validate_sync,
};
pub use error::{AntivirusError, Result, StoreError};
pub use keys::{KeyDecodeError, decode_object_key, encode_object_key};
pub use types::{
    BucketEntity, Encryption, EventRecord, ObjectCreatedEvent, ObjectEntity, ObjectRef, Response,
    S3Entity, Tag, TagSet, Verdict,
};
