//! Object storage for cached artist song lists.
//!
//! [`ObjectStore`] is the blob-store seam with two backends:
//!
//! - [`S3ObjectStore`]: any S3-compatible service (AWS, MinIO, R2)
//! - [`MemoryObjectStore`]: in-process map, used in tests and local runs
//!
//! [`LazyObjectStore`] resolves the configured backend once per process and
//! caches the outcome, including "disabled". [`ArtistSongStore`] owns the
//! `artist-songs/{key}.json` layout on top of any backend.

pub mod artist_songs;
pub mod lazy;
pub mod memory;
pub mod s3;

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

pub use artist_songs::{ArtistSongStore, ArtistSongsMetadata};
pub use lazy::LazyObjectStore;
pub use memory::MemoryObjectStore;
pub use s3::S3ObjectStore;

/// Object store operation errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("malformed object {key}: {reason}")]
    Malformed { key: String, reason: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// The expected miss condition, as opposed to a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Result type for object store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Object attributes returned by [`ObjectStore::head`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectInfo {
    pub size: u64,
    pub content_type: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    /// User metadata stored alongside the object.
    pub metadata: HashMap<String, String>,
}

/// Key/value blob store.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Get an object's content.
    async fn get(&self, key: &str) -> StoreResult<Bytes>;

    /// Put an object, replacing any previous version and its metadata.
    async fn put(
        &self, key: &str, body: Bytes, content_type: &str, metadata: &HashMap<String, String>,
    ) -> StoreResult<()>;

    /// Get an object's attributes without fetching content.
    async fn head(&self, key: &str) -> StoreResult<ObjectInfo>;

    /// All keys starting with `prefix`, across every page.
    async fn list(&self, prefix: &str) -> StoreResult<Vec<String>>;

    /// Delete an object. Returns `NotFound` if it did not exist.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;
}
