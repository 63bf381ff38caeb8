//! Storage seams for the local chord-sheet cache.
//!
//! [`ChordSheetRepository`] is the structured record store and
//! [`LegacyStorage`] is the flat string store the records used to live in.
//! [`crate::CacheDb`] implements both on SQLite.

use async_trait::async_trait;

use crate::Error;
use crate::models::{ChordSheet, ChordSheetRecord};

/// Tier and timestamps for a repository write. Times are epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    pub saved: bool,
    pub cached_at: i64,
    pub expires_at: i64,
}

/// Row counts by tier at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TierCounts {
    pub saved: u64,
    pub regular: u64,
    /// Regular-tier rows whose `expires_at` has passed.
    pub expired: u64,
}

/// CRUD over chord-sheet records keyed by the normalized (artist, title).
///
/// Implementations serialize their own reads and writes. Callers composing
/// several calls get no atomicity across them.
#[async_trait]
pub trait ChordSheetRepository: Send + Sync {
    async fn get(&self, artist: &str, title: &str) -> Result<Option<ChordSheetRecord>, Error>;

    /// Insert or fully overwrite a record. Usage counters survive overwrites.
    async fn store(
        &self, artist: &str, title: &str, chord_sheet: &ChordSheet, options: StoreOptions,
    ) -> Result<ChordSheetRecord, Error>;

    /// Returns whether a record was removed.
    async fn delete(&self, artist: &str, title: &str) -> Result<bool, Error>;

    async fn get_all_saved(&self) -> Result<Vec<ChordSheetRecord>, Error>;

    async fn get_expired_entries(&self, now: i64) -> Result<Vec<ChordSheetRecord>, Error>;

    /// Returns the number of removed records.
    async fn remove_expired_entries(&self, now: i64) -> Result<u64, Error>;

    /// Returns the number of removed records.
    async fn clear(&self) -> Result<u64, Error>;

    async fn is_saved(&self, artist: &str, title: &str) -> Result<bool, Error>;

    /// Record an access for recency ordering.
    async fn touch(&self, artist: &str, title: &str, now: i64) -> Result<(), Error>;

    /// Change a record's tier. Counts as an access. Returns `false` when no record exists.
    async fn set_saved(
        &self, artist: &str, title: &str, saved: bool, expires_at: i64, now: i64,
    ) -> Result<bool, Error>;

    async fn tier_counts(&self, now: i64) -> Result<TierCounts, Error>;

    /// Drop least-recently-accessed regular-tier records until at most
    /// `max_regular` remain. Returns the number of removed records.
    async fn evict_least_recently_accessed(&self, max_regular: usize) -> Result<u64, Error>;
}

/// Flat string key/value storage.
#[async_trait]
pub trait LegacyStorage: Send + Sync {
    async fn get_item(&self, key: &str) -> Result<Option<String>, Error>;

    async fn set_item(&self, key: &str, value: &str) -> Result<(), Error>;

    /// Returns whether the key existed.
    async fn remove_item(&self, key: &str) -> Result<bool, Error>;
}
