//! Lazily-resolved object store handle.

use std::sync::Arc;

use chordium_core::config::ObjectStoreConfig;
use tokio::sync::OnceCell;

use super::{ObjectStore, S3ObjectStore};

/// Resolves the configured object store on first use and caches the outcome.
///
/// A missing or broken configuration resolves to "disabled" once, with a single
/// warning; later calls see `None` without retrying.
pub struct LazyObjectStore {
    config: Option<ObjectStoreConfig>,
    cell: OnceCell<Option<Arc<dyn ObjectStore>>>,
}

impl std::fmt::Debug for LazyObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.cell.get() {
            None => "unresolved",
            Some(None) => "disabled",
            Some(Some(_)) => "ready",
        };
        f.debug_struct("LazyObjectStore").field("state", &state).finish_non_exhaustive()
    }
}

impl LazyObjectStore {
    /// Resolve an S3 store from `config` on first use.
    pub fn from_config(config: ObjectStoreConfig) -> Self {
        Self { config: Some(config), cell: OnceCell::new() }
    }

    /// An already-resolved store.
    pub fn ready(store: Arc<dyn ObjectStore>) -> Self {
        Self { config: None, cell: OnceCell::new_with(Some(Some(store))) }
    }

    /// A store that is permanently disabled.
    pub fn disabled() -> Self {
        Self { config: None, cell: OnceCell::new_with(Some(None)) }
    }

    /// The store, or `None` when it is disabled.
    pub async fn get(&self) -> Option<Arc<dyn ObjectStore>> {
        self.cell.get_or_init(|| async { self.resolve() }).await.clone()
    }

    pub async fn is_enabled(&self) -> bool {
        self.get().await.is_some()
    }

    fn resolve(&self) -> Option<Arc<dyn ObjectStore>> {
        let Some(config) = self.config.as_ref() else {
            return None;
        };

        if !config.is_enabled() {
            tracing::warn!("object store disabled: bucket or credentials not configured");
            return None;
        }

        match S3ObjectStore::new(config) {
            Ok(store) => {
                tracing::info!(bucket = store.bucket(), region = %config.region, "object store enabled");
                Some(Arc::new(store))
            }
            Err(e) => {
                tracing::warn!(error = %e, "object store disabled");
                None
            }
        }
    }
}
