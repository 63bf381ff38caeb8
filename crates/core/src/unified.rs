//! Two-tier chord sheet cache over a [`ChordSheetRepository`].
//!
//! Records are either *saved* (user-curated, never expire, never evicted) or
//! *regular* (fetched content with a TTL, evicted least-recently-accessed first
//! once the tier grows past its capacity). Expiration is enforced lazily on
//! read; [`UnifiedChordSheetCache::spawn_sweeper`] adds an optional periodic sweep.
//!
//! No method here returns an error. Repository failures are logged and turned
//! into the neutral value for the operation (`None`, `false`, `0`).

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;

use crate::cache::keys;
use crate::config::AppConfig;
use crate::models::{ChordSheet, ChordSheetRecord, NEVER_EXPIRES};
use crate::repository::{ChordSheetRepository, StoreOptions};

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Maps a retention tier to an expiry timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpirationPolicy {
    regular_ttl_ms: i64,
}

impl ExpirationPolicy {
    pub fn new(regular_ttl: Duration) -> Self {
        Self { regular_ttl_ms: i64::try_from(regular_ttl.as_millis()).unwrap_or(i64::MAX) }
    }

    /// Saved records never expire; regular records expire `regular_ttl` after `now`.
    pub fn expires_at(&self, saved: bool, now: i64) -> i64 {
        if saved { NEVER_EXPIRES } else { now.saturating_add(self.regular_ttl_ms).min(NEVER_EXPIRES) }
    }
}

/// Tunables for [`UnifiedChordSheetCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnifiedCacheConfig {
    pub regular_ttl: Duration,
    pub max_regular_items: usize,
}

impl Default for UnifiedCacheConfig {
    fn default() -> Self {
        Self { regular_ttl: Duration::from_secs(24 * 60 * 60), max_regular_items: 500 }
    }
}

impl From<&AppConfig> for UnifiedCacheConfig {
    fn from(config: &AppConfig) -> Self {
        Self { regular_ttl: config.regular_ttl(), max_regular_items: config.max_regular_items }
    }
}

/// Options for [`UnifiedChordSheetCache::cache_chord_sheet`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheOptions {
    /// Target tier. `None` keeps the tier of an existing record, or regular for a new one.
    pub saved: Option<bool>,
}

impl CacheOptions {
    pub fn saved() -> Self {
        Self { saved: Some(true) }
    }

    pub fn regular() -> Self {
        Self { saved: Some(false) }
    }
}

/// Advisory record counts. Not a consistent snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub total: u64,
    pub saved: u64,
    pub regular: u64,
    pub expired: u64,
    pub valid: u64,
}

/// True when either part normalizes to an empty key component.
fn is_blank(artist: &str, title: &str) -> bool {
    keys::normalize_component(artist).is_empty() || keys::normalize_component(title).is_empty()
}

fn is_live(record: &ChordSheetRecord, now: i64) -> bool {
    record.metadata.saved || !record.cache_info.is_expired(now)
}

/// Retention-tier cache of full chord sheets.
pub struct UnifiedChordSheetCache {
    repo: Arc<dyn ChordSheetRepository>,
    config: UnifiedCacheConfig,
    policy: ExpirationPolicy,
}

impl UnifiedChordSheetCache {
    pub fn new(repo: Arc<dyn ChordSheetRepository>, config: UnifiedCacheConfig) -> Self {
        let policy = ExpirationPolicy::new(config.regular_ttl);
        Self { repo, config, policy }
    }

    pub fn config(&self) -> &UnifiedCacheConfig {
        &self.config
    }

    pub fn policy(&self) -> ExpirationPolicy {
        self.policy
    }

    /// Write a chord sheet. Returns whether the write happened.
    pub async fn cache_chord_sheet(
        &self, artist: &str, title: &str, chord_sheet: &ChordSheet, options: CacheOptions,
    ) -> bool {
        if is_blank(artist, title) {
            tracing::warn!(artist, title, "refusing to cache chord sheet without artist and title");
            return false;
        }

        let saved = match options.saved {
            Some(saved) => saved,
            None => match self.repo.get(artist, title).await {
                Ok(existing) => existing.is_some_and(|record| record.metadata.saved),
                Err(e) => {
                    tracing::error!(artist, title, error = %e, "failed to read existing tier, defaulting to regular");
                    false
                }
            },
        };

        let now = now_millis();
        let options = StoreOptions { saved, cached_at: now, expires_at: self.policy.expires_at(saved, now) };
        if let Err(e) = self.repo.store(artist, title, chord_sheet, options).await {
            tracing::error!(artist, title, error = %e, "failed to cache chord sheet");
            return false;
        }
        tracing::debug!(artist, title, saved, "cached chord sheet");

        if !saved {
            self.enforce_capacity().await;
        }
        true
    }

    /// Cached chord sheet, or `None` when absent or expired. Expired records are deleted.
    pub async fn get_cached_chord_sheet(&self, artist: &str, title: &str) -> Option<ChordSheet> {
        if is_blank(artist, title) {
            tracing::warn!(artist, title, "chord sheet lookup without artist and title");
            return None;
        }

        let record = self.resolve_live(artist, title).await?;
        if let Err(e) = self.repo.touch(artist, title, now_millis()).await {
            tracing::error!(artist, title, error = %e, "failed to record chord sheet access");
        }
        Some(record.chord_sheet)
    }

    /// Move a record between tiers. Returns `false` when no live record exists.
    pub async fn set_saved_status(&self, artist: &str, title: &str, saved: bool) -> bool {
        if is_blank(artist, title) {
            tracing::warn!(artist, title, "saved status change without artist and title");
            return false;
        }

        if self.resolve_live(artist, title).await.is_none() {
            return false;
        }

        let now = now_millis();
        let expires_at = self.policy.expires_at(saved, now);
        let updated = match self.repo.set_saved(artist, title, saved, expires_at, now).await {
            Ok(updated) => updated,
            Err(e) => {
                tracing::error!(artist, title, saved, error = %e, "failed to change saved status");
                return false;
            }
        };

        if updated {
            tracing::info!(artist, title, saved, "changed chord sheet tier");
            if !saved {
                self.enforce_capacity().await;
            }
        }
        updated
    }

    pub async fn is_chord_sheet_saved(&self, artist: &str, title: &str) -> bool {
        if is_blank(artist, title) {
            return false;
        }
        self.repo.is_saved(artist, title).await.unwrap_or_else(|e| {
            tracing::error!(artist, title, error = %e, "failed to read saved status");
            false
        })
    }

    /// Whether a live record exists. Deletes the record if it has expired.
    pub async fn is_chord_sheet_cached(&self, artist: &str, title: &str) -> bool {
        if is_blank(artist, title) {
            return false;
        }
        self.resolve_live(artist, title).await.is_some()
    }

    /// Every saved chord sheet, newest first.
    pub async fn get_all_saved_chord_sheets(&self) -> Vec<ChordSheet> {
        match self.repo.get_all_saved().await {
            Ok(records) => records.into_iter().map(|record| record.chord_sheet).collect(),
            Err(e) => {
                tracing::error!(error = %e, "failed to list saved chord sheets");
                Vec::new()
            }
        }
    }

    pub async fn remove_chord_sheet(&self, artist: &str, title: &str) -> bool {
        if is_blank(artist, title) {
            tracing::warn!(artist, title, "chord sheet removal without artist and title");
            return false;
        }
        self.repo.delete(artist, title).await.unwrap_or_else(|e| {
            tracing::error!(artist, title, error = %e, "failed to remove chord sheet");
            false
        })
    }

    /// Delete every expired regular record. Returns the number removed.
    pub async fn clear_expired_entries(&self) -> u64 {
        match self.repo.remove_expired_entries(now_millis()).await {
            Ok(0) => 0,
            Ok(removed) => {
                tracing::info!(removed, "cleared expired chord sheets");
                removed
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to clear expired chord sheets");
                0
            }
        }
    }

    /// Delete every record in both tiers. Returns the number removed.
    pub async fn clear_all_cache(&self) -> u64 {
        match self.repo.clear().await {
            Ok(removed) => {
                tracing::info!(removed, "cleared chord sheet cache");
                removed
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to clear chord sheet cache");
                0
            }
        }
    }

    pub async fn get_cache_stats(&self) -> CacheStats {
        match self.repo.tier_counts(now_millis()).await {
            Ok(counts) => {
                let total = counts.saved + counts.regular;
                CacheStats {
                    total,
                    saved: counts.saved,
                    regular: counts.regular,
                    expired: counts.expired,
                    valid: total.saturating_sub(counts.expired),
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to compute cache stats");
                CacheStats::default()
            }
        }
    }

    /// Run [`Self::clear_expired_entries`] every `interval` until the handle is aborted.
    pub fn spawn_sweeper(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let removed = self.clear_expired_entries().await;
                tracing::debug!(removed, "expiration sweep finished");
            }
        })
    }

    /// Fetch a record and apply lazy expiration.
    async fn resolve_live(&self, artist: &str, title: &str) -> Option<ChordSheetRecord> {
        let record = match self.repo.get(artist, title).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                tracing::debug!(artist, title, "chord sheet cache miss");
                return None;
            }
            Err(e) => {
                tracing::error!(artist, title, error = %e, "failed to read chord sheet");
                return None;
            }
        };

        if is_live(&record, now_millis()) {
            return Some(record);
        }

        tracing::debug!(artist, title, expires_at = record.cache_info.expires_at, "chord sheet expired");
        if let Err(e) = self.repo.delete(artist, title).await {
            tracing::error!(artist, title, error = %e, "failed to delete expired chord sheet");
        }
        None
    }

    async fn enforce_capacity(&self) {
        match self.repo.evict_least_recently_accessed(self.config.max_regular_items).await {
            Ok(0) => {}
            Ok(evicted) => {
                tracing::info!(evicted, max = self.config.max_regular_items, "evicted regular chord sheets");
            }
            Err(e) => tracing::error!(error = %e, "failed to enforce regular-tier capacity"),
        }
    }
}
