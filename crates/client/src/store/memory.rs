//! In-process object store.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use super::{ObjectInfo, ObjectStore, StoreError, StoreResult};

#[derive(Debug, Clone)]
struct StoredObject {
    body: Bytes,
    content_type: String,
    metadata: HashMap<String, String>,
    last_modified: DateTime<Utc>,
}

/// Object store backed by an ordered map.
///
/// Counts writes and can be switched to fail every call, so callers can check
/// write-back behaviour and degradation paths.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<String, StoredObject>>,
    puts: AtomicUsize,
    unavailable: AtomicBool,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `put` calls so far.
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// Make every subsequent call fail with a backend error (or succeed again).
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Insert raw bytes without counting a write.
    pub fn insert_raw(&self, key: &str, body: impl Into<Bytes>) {
        let object = StoredObject {
            body: body.into(),
            content_type: "application/octet-stream".into(),
            metadata: HashMap::new(),
            last_modified: Utc::now(),
        };
        self.lock().insert(key.to_string(), object);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, StoredObject>> {
        // A panic while holding the lock cannot leave the map half-updated.
        self.objects.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("memory store unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get(&self, key: &str) -> StoreResult<Bytes> {
        self.check_available()?;
        self.lock()
            .get(key)
            .map(|object| object.body.clone())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn put(
        &self, key: &str, body: Bytes, content_type: &str, metadata: &HashMap<String, String>,
    ) -> StoreResult<()> {
        self.check_available()?;
        let object = StoredObject {
            body,
            content_type: content_type.to_string(),
            metadata: metadata.clone(),
            last_modified: Utc::now(),
        };
        self.lock().insert(key.to_string(), object);
        self.puts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn head(&self, key: &str) -> StoreResult<ObjectInfo> {
        self.check_available()?;
        self.lock()
            .get(key)
            .map(|object| ObjectInfo {
                size: object.body.len() as u64,
                content_type: Some(object.content_type.clone()),
                last_modified: Some(object.last_modified),
                metadata: object.metadata.clone(),
            })
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
        self.check_available()?;
        Ok(self.lock().keys().filter(|key| key.starts_with(prefix)).cloned().collect())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.check_available()?;
        self.lock()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
