//! One-time transfer of legacy flat-storage chord sheets into the repository.
//!
//! The service scans [`LegacyKey::ALL`], stores every valid item it has not
//! seen before, and sets [`MIGRATION_COMPLETED_KEY`] once a run finishes with
//! no errors. After that, [`MigrationService::migrate`] is a no-op.

pub mod legacy;

use std::sync::Arc;

use serde::Serialize;

pub use legacy::{
    LegacyChordSheet, LegacyEntry, LegacyItem, LegacyKey, LegacyPayload, MIGRATION_COMPLETED_KEY,
    MIGRATION_COMPLETED_VALUE,
};

use crate::repository::{ChordSheetRepository, LegacyStorage, StoreOptions};
use crate::unified::{ExpirationPolicy, UnifiedCacheConfig, now_millis};

/// Outcome of a [`MigrationService::migrate`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationResult {
    pub success: bool,
    pub migrated_count: u64,
    /// Items already present in the repository, plus items missing required fields.
    pub skipped_count: u64,
    pub errors: Vec<String>,
}

/// Legacy keys found by [`MigrationService::cleanup_local_storage`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub dry_run: bool,
    pub candidates: Vec<String>,
    pub removed: Vec<String>,
}

pub struct MigrationService {
    storage: Arc<dyn LegacyStorage>,
    repo: Arc<dyn ChordSheetRepository>,
    policy: ExpirationPolicy,
    max_regular_items: usize,
}

impl MigrationService {
    /// Migrated records get the expiry and regular-tier capacity of `config`.
    pub fn new(
        storage: Arc<dyn LegacyStorage>, repo: Arc<dyn ChordSheetRepository>, config: UnifiedCacheConfig,
    ) -> Self {
        Self {
            storage,
            repo,
            policy: ExpirationPolicy::new(config.regular_ttl),
            max_regular_items: config.max_regular_items,
        }
    }

    pub async fn is_migration_completed(&self) -> bool {
        match self.storage.get_item(MIGRATION_COMPLETED_KEY).await {
            Ok(value) => value.as_deref() == Some(MIGRATION_COMPLETED_VALUE),
            Err(e) => {
                tracing::error!(error = %e, "failed to read migration flag");
                false
            }
        }
    }

    /// Run the migration unless it already completed. Never fails; problems land in `errors`.
    pub async fn migrate(&self) -> MigrationResult {
        if self.is_migration_completed().await {
            tracing::debug!("legacy migration already completed");
            return MigrationResult { success: true, ..Default::default() };
        }

        let mut result = MigrationResult::default();

        for key in LegacyKey::ALL {
            let raw = match self.storage.get_item(key.as_str()).await {
                Ok(Some(raw)) => raw,
                Ok(None) => continue,
                Err(e) => {
                    tracing::error!(key = %key, error = %e, "failed to read legacy key");
                    result.errors.push(format!("{key}: {e}"));
                    continue;
                }
            };

            let payload = match LegacyPayload::parse(key, &raw) {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::error!(key = %key, error = %e, "unreadable legacy payload");
                    result.errors.push(format!("{key}: {e}"));
                    continue;
                }
            };

            tracing::debug!(key = %key, items = payload.len(), "migrating legacy key");
            for entry in payload.into_entries(key) {
                self.migrate_entry(entry, &mut result).await;
            }
        }

        if result.migrated_count > 0 {
            match self.repo.evict_least_recently_accessed(self.max_regular_items).await {
                Ok(0) => {}
                Ok(evicted) => tracing::info!(evicted, "evicted migrated chord sheets over regular capacity"),
                Err(e) => {
                    tracing::error!(error = %e, "failed to enforce regular capacity after migration");
                    result.errors.push(format!("capacity: {e}"));
                }
            }
        }

        result.success = result.errors.is_empty();
        if result.success {
            if let Err(e) = self.storage.set_item(MIGRATION_COMPLETED_KEY, MIGRATION_COMPLETED_VALUE).await {
                tracing::error!(error = %e, "failed to set migration flag");
                result.errors.push(format!("{MIGRATION_COMPLETED_KEY}: {e}"));
                result.success = false;
            }
        }

        if result.success {
            tracing::info!(
                migrated = result.migrated_count,
                skipped = result.skipped_count,
                "legacy migration completed"
            );
        } else {
            tracing::warn!(
                migrated = result.migrated_count,
                skipped = result.skipped_count,
                errors = result.errors.len(),
                "legacy migration finished with errors, will retry on next start"
            );
        }
        result
    }

    async fn migrate_entry(&self, entry: LegacyEntry, result: &mut MigrationResult) {
        let item = match entry {
            LegacyEntry::Valid(item) => item,
            LegacyEntry::Invalid { label, reason } => {
                tracing::warn!(item = %label, reason = %reason, "skipping invalid legacy chord sheet");
                result.skipped_count += 1;
                return;
            }
            LegacyEntry::Malformed { label, error } => {
                tracing::error!(item = %label, error = %error, "malformed legacy chord sheet");
                result.errors.push(format!("{label}: {error}"));
                return;
            }
        };

        let artist = item.chord_sheet.artist.as_str();
        let title = item.chord_sheet.title.as_str();

        match self.repo.get(artist, title).await {
            Ok(Some(_)) => {
                result.skipped_count += 1;
                return;
            }
            Ok(None) => {}
            Err(e) => {
                result.errors.push(format!("{artist} - {title}: {e}"));
                return;
            }
        }

        let now = now_millis();
        let expires_at = self.policy.expires_at(item.saved, now);
        let options = StoreOptions { saved: item.saved, cached_at: now, expires_at };
        match self.repo.store(artist, title, &item.chord_sheet, options).await {
            Ok(_) => result.migrated_count += 1,
            Err(e) => {
                tracing::error!(artist, title, error = %e, "failed to store legacy chord sheet");
                result.errors.push(format!("{artist} - {title}: {e}"));
            }
        }
    }

    /// Remove the legacy keys. With `dry_run` the keys are only reported.
    ///
    /// The completion flag is never touched.
    pub async fn cleanup_local_storage(&self, dry_run: bool) -> CleanupReport {
        let mut report = CleanupReport { dry_run, ..Default::default() };

        for key in LegacyKey::ALL {
            match self.storage.get_item(key.as_str()).await {
                Ok(Some(_)) => report.candidates.push(key.as_str().to_string()),
                Ok(None) => continue,
                Err(e) => {
                    tracing::error!(key = %key, error = %e, "failed to read legacy key");
                    continue;
                }
            }

            if dry_run {
                tracing::info!(key = %key, "would remove legacy key");
                continue;
            }

            match self.storage.remove_item(key.as_str()).await {
                Ok(true) => {
                    tracing::info!(key = %key, "removed legacy key");
                    report.removed.push(key.as_str().to_string());
                }
                Ok(false) => {}
                Err(e) => tracing::error!(key = %key, error = %e, "failed to remove legacy key"),
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CacheDb;
    use crate::unified::{CacheOptions, UnifiedCacheConfig, UnifiedChordSheetCache};
    use serde_json::json;
    use std::time::Duration;

    async fn setup() -> (CacheDb, MigrationService) {
        setup_with_capacity(500).await
    }

    async fn setup_with_capacity(max_regular_items: usize) -> (CacheDb, MigrationService) {
        let db = CacheDb::open_in_memory().await.unwrap();
        let config = UnifiedCacheConfig { regular_ttl: Duration::from_secs(3600), max_regular_items };
        let service = MigrationService::new(Arc::new(db.clone()), Arc::new(db.clone()), config);
        (db, service)
    }

    fn sheet_json(artist: &str, title: &str) -> serde_json::Value {
        json!({ "title": title, "artist": artist, "songChords": "[D] [A]", "songKey": "D" })
    }

    #[tokio::test]
    async fn test_migrate_all_shapes() {
        let (db, service) = setup().await;
        db.set_item(
            "chordium-chord-sheet-cache",
            &json!({ "items": [
                { "data": sheet_json("Coldplay", "Yellow"), "saved": false },
                { "data": sheet_json("Coldplay", "Fix You"), "saved": true }
            ]})
            .to_string(),
        )
        .await
        .unwrap();
        db.set_item(
            "chord-sheet-cache",
            &json!({ "coldplay_clocks": { "data": sheet_json("Coldplay", "Clocks") } }).to_string(),
        )
        .await
        .unwrap();
        db.set_item("myChordSheets", &json!([sheet_json("Queen", "Bohemian Rhapsody")]).to_string())
            .await
            .unwrap();

        let result = service.migrate().await;
        assert!(result.success, "{:?}", result.errors);
        assert_eq!(result.migrated_count, 4);
        assert_eq!(result.skipped_count, 0);
        assert!(service.is_migration_completed().await);

        let cache = UnifiedChordSheetCache::new(Arc::new(db.clone()), UnifiedCacheConfig::default());
        assert!(cache.is_chord_sheet_saved("Coldplay", "Fix You").await);
        assert!(cache.is_chord_sheet_saved("Queen", "Bohemian Rhapsody").await);
        assert!(!cache.is_chord_sheet_saved("Coldplay", "Yellow").await);
        assert!(cache.get_cached_chord_sheet("coldplay", "clocks").await.is_some());
    }

    #[tokio::test]
    async fn test_completed_migration_is_noop() {
        let (db, service) = setup().await;
        db.set_item(MIGRATION_COMPLETED_KEY, "true").await.unwrap();
        db.set_item("my-chord-sheets", &json!([sheet_json("a", "b")]).to_string()).await.unwrap();

        let result = service.migrate().await;
        assert_eq!(result, MigrationResult { success: true, ..Default::default() });
        assert!(db.get_item("my-chord-sheets").await.unwrap().is_some());
        assert_eq!(db.tier_counts(0).await.unwrap().saved, 0);
    }

    #[tokio::test]
    async fn test_errors_leave_flag_unset_and_retry_skips() {
        let (db, service) = setup().await;
        db.set_item("my-chord-sheets", &json!([sheet_json("a", "one"), sheet_json("a", "two")]).to_string())
            .await
            .unwrap();
        db.set_item("chord-sheet-cache", "{ truncated").await.unwrap();

        let first = service.migrate().await;
        assert!(!first.success);
        assert_eq!(first.migrated_count, 2);
        assert_eq!(first.errors.len(), 1);
        assert!(!service.is_migration_completed().await);

        db.remove_item("chord-sheet-cache").await.unwrap();

        let second = service.migrate().await;
        assert!(second.success);
        assert_eq!(second.migrated_count, 0);
        assert_eq!(second.skipped_count, 2);
        assert!(service.is_migration_completed().await);
    }

    #[tokio::test]
    async fn test_existing_records_are_not_overwritten() {
        let (db, service) = setup().await;
        let cache = UnifiedChordSheetCache::new(Arc::new(db.clone()), UnifiedCacheConfig::default());
        let current = crate::models::ChordSheet {
            title: "Song".into(),
            artist: "Band".into(),
            song_chords: "current".into(),
            song_key: String::new(),
            guitar_tuning: Vec::new(),
            guitar_capo: 0,
        };
        cache.cache_chord_sheet("Band", "Song", &current, CacheOptions::regular()).await;
        db.set_item("my-chord-sheets", &json!([sheet_json("band", "song")]).to_string()).await.unwrap();

        let result = service.migrate().await;
        assert_eq!(result.skipped_count, 1);
        assert_eq!(result.migrated_count, 0);
        assert_eq!(cache.get_cached_chord_sheet("Band", "Song").await.unwrap().song_chords, "current");
    }

    #[tokio::test]
    async fn test_invalid_items_skipped_malformed_items_reported() {
        let (db, service) = setup().await;
        db.set_item(
            "my-chord-sheets-cache",
            &json!([{ "title": "no artist", "songChords": "x" }, "not an object", sheet_json("a", "b")]).to_string(),
        )
        .await
        .unwrap();

        let result = service.migrate().await;
        assert_eq!(result.migrated_count, 1);
        assert_eq!(result.skipped_count, 1);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].starts_with("my-chord-sheets-cache[1]"));
    }

    #[tokio::test]
    async fn test_migrated_regular_items_respect_capacity() {
        let (db, service) = setup_with_capacity(2).await;
        db.set_item(
            "chordium-chord-sheet-cache",
            &json!({ "items": [
                { "data": sheet_json("Muse", "Uprising"), "saved": false },
                { "data": sheet_json("Muse", "Starlight"), "saved": false },
                { "data": sheet_json("Muse", "Hysteria"), "saved": false },
                { "data": sheet_json("Muse", "Madness"), "saved": true }
            ]})
            .to_string(),
        )
        .await
        .unwrap();

        let result = service.migrate().await;
        assert!(result.success, "{:?}", result.errors);
        assert_eq!(result.migrated_count, 4);

        let counts = db.tier_counts(0).await.unwrap();
        assert_eq!(counts.regular, 2);
        assert_eq!(counts.saved, 1);
        assert!(db.get("Muse", "Uprising").await.unwrap().is_none());
        assert!(db.get("Muse", "Hysteria").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_punctuation_only_names_are_skipped() {
        let (db, service) = setup().await;
        db.set_item("my-chord-sheets", &json!([sheet_json("!!!", "Heart"), sheet_json("Heart", "Alone")]).to_string())
            .await
            .unwrap();

        let result = service.migrate().await;
        assert!(result.success);
        assert_eq!(result.migrated_count, 1);
        assert_eq!(result.skipped_count, 1);
    }

    #[tokio::test]
    async fn test_cleanup_dry_run_then_apply() {
        let (db, service) = setup().await;
        db.set_item("my-chord-sheets", "[]").await.unwrap();
        db.set_item("chord-sheet-cache", "{}").await.unwrap();
        db.set_item(MIGRATION_COMPLETED_KEY, "true").await.unwrap();
        db.set_item("unrelated", "keep").await.unwrap();

        let dry = service.cleanup_local_storage(true).await;
        assert_eq!(dry.candidates, vec!["chord-sheet-cache".to_string(), "my-chord-sheets".to_string()]);
        assert!(dry.removed.is_empty());
        assert!(db.get_item("my-chord-sheets").await.unwrap().is_some());

        let applied = service.cleanup_local_storage(false).await;
        assert_eq!(applied.removed, applied.candidates);
        assert_eq!(
            db.local_storage_keys().await.unwrap(),
            vec![MIGRATION_COMPLETED_KEY.to_string(), "unrelated".to_string()]
        );
    }
}
