//! Chord sheet record CRUD operations.
//!
//! SQLite implementation of [`ChordSheetRepository`]. Rows are keyed by
//! [`keys::encode`], so every spelling of the same (artist, title) resolves
//! to the same record.

use async_trait::async_trait;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

use super::connection::CacheDb;
use super::keys;
use crate::Error;
use crate::models::{CacheInfo, ChordSheet, ChordSheetRecord, RECORD_VERSION, RecordMetadata};
use crate::repository::{ChordSheetRepository, StoreOptions, TierCounts};

const RECORD_COLUMNS: &str =
    "cache_key, chord_sheet_json, saved, cached_at, expires_at, last_accessed, access_count, version";

/// Next value of the recency counter, evaluated inside the statement that uses it.
const NEXT_ACCESS_SEQ: &str = "(SELECT COALESCE(MAX(access_seq), 0) + 1 FROM chord_sheets)";

/// A row as read from SQLite, before the JSON payload is decoded.
struct RawRecord {
    key: String,
    chord_sheet_json: String,
    saved: bool,
    cached_at: i64,
    expires_at: i64,
    last_accessed: i64,
    access_count: i64,
    version: i64,
}

impl RawRecord {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            key: row.get(0)?,
            chord_sheet_json: row.get(1)?,
            saved: row.get(2)?,
            cached_at: row.get(3)?,
            expires_at: row.get(4)?,
            last_accessed: row.get(5)?,
            access_count: row.get(6)?,
            version: row.get(7)?,
        })
    }

    fn into_record(self) -> Result<ChordSheetRecord, Error> {
        let chord_sheet: ChordSheet = serde_json::from_str(&self.chord_sheet_json)?;
        Ok(ChordSheetRecord {
            key: self.key,
            chord_sheet,
            metadata: RecordMetadata {
                saved: self.saved,
                last_accessed: self.last_accessed,
                access_count: self.access_count.max(0) as u64,
            },
            cache_info: CacheInfo {
                cached_at: self.cached_at,
                expires_at: self.expires_at,
                version: self.version.max(0) as u32,
            },
        })
    }
}

fn query_record(conn: &rusqlite::Connection, key: &str) -> Result<Option<RawRecord>, Error> {
    let mut stmt = conn.prepare(&format!("SELECT {RECORD_COLUMNS} FROM chord_sheets WHERE cache_key = ?1"))?;

    match stmt.query_row(params![key], RawRecord::from_row) {
        Ok(raw) => Ok(Some(raw)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn query_records(conn: &rusqlite::Connection, sql: &str, args: impl rusqlite::Params) -> Result<Vec<RawRecord>, Error> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(args, RawRecord::from_row)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Error::from)
}

/// Decode a batch of rows. Rows with an undecodable payload are logged and skipped.
fn decode_all(raw: Vec<RawRecord>) -> Vec<ChordSheetRecord> {
    raw.into_iter()
        .filter_map(|row| {
            let key = row.key.clone();
            match row.into_record() {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "skipping undecodable chord sheet row");
                    None
                }
            }
        })
        .collect()
}

#[async_trait]
impl ChordSheetRepository for CacheDb {
    async fn get(&self, artist: &str, title: &str) -> Result<Option<ChordSheetRecord>, Error> {
        let key = keys::encode(artist, title);
        let raw = self
            .conn
            .call(move |conn| -> Result<Option<RawRecord>, Error> { query_record(conn, &key) })
            .await
            .map_err(Error::from)?;

        raw.map(RawRecord::into_record).transpose()
    }

    async fn store(
        &self, artist: &str, title: &str, chord_sheet: &ChordSheet, options: StoreOptions,
    ) -> Result<ChordSheetRecord, Error> {
        let key = keys::encode(artist, title);
        let artist = artist.to_string();
        let title = title.to_string();
        let chord_sheet_json = serde_json::to_string(chord_sheet)?;

        let raw = self
            .conn
            .call(move |conn| -> Result<Option<RawRecord>, Error> {
                conn.execute(
                    &format!(
                        "INSERT INTO chord_sheets (
                        cache_key, artist, title, chord_sheet_json, saved,
                        cached_at, expires_at, last_accessed, access_count, access_seq, version
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?6, 0, {NEXT_ACCESS_SEQ}, ?8)
                    ON CONFLICT(cache_key) DO UPDATE SET
                        artist = excluded.artist,
                        title = excluded.title,
                        chord_sheet_json = excluded.chord_sheet_json,
                        saved = excluded.saved,
                        cached_at = excluded.cached_at,
                        expires_at = excluded.expires_at,
                        last_accessed = excluded.last_accessed,
                        access_seq = excluded.access_seq,
                        version = excluded.version"
                    ),
                    params![
                        &key,
                        &artist,
                        &title,
                        &chord_sheet_json,
                        options.saved,
                        options.cached_at,
                        options.expires_at,
                        RECORD_VERSION,
                    ],
                )?;
                query_record(conn, &key)
            })
            .await
            .map_err(Error::from)?;

        raw.ok_or_else(|| Error::Serialization("stored record could not be read back".into()))?
            .into_record()
    }

    async fn delete(&self, artist: &str, title: &str) -> Result<bool, Error> {
        let key = keys::encode(artist, title);
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM chord_sheets WHERE cache_key = ?1", params![key])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    async fn get_all_saved(&self) -> Result<Vec<ChordSheetRecord>, Error> {
        let raw = self
            .conn
            .call(move |conn| -> Result<Vec<RawRecord>, Error> {
                query_records(
                    conn,
                    &format!("SELECT {RECORD_COLUMNS} FROM chord_sheets WHERE saved = 1 ORDER BY cached_at DESC"),
                    [],
                )
            })
            .await
            .map_err(Error::from)?;

        Ok(decode_all(raw))
    }

    async fn get_expired_entries(&self, now: i64) -> Result<Vec<ChordSheetRecord>, Error> {
        let raw = self
            .conn
            .call(move |conn| -> Result<Vec<RawRecord>, Error> {
                query_records(
                    conn,
                    &format!("SELECT {RECORD_COLUMNS} FROM chord_sheets WHERE saved = 0 AND expires_at < ?1"),
                    params![now],
                )
            })
            .await
            .map_err(Error::from)?;

        Ok(decode_all(raw))
    }

    async fn remove_expired_entries(&self, now: i64) -> Result<u64, Error> {
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM chord_sheets WHERE saved = 0 AND expires_at < ?1", params![now])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    async fn clear(&self) -> Result<u64, Error> {
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM chord_sheets", [])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    async fn is_saved(&self, artist: &str, title: &str) -> Result<bool, Error> {
        let key = keys::encode(artist, title);
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let saved: bool = conn
                    .query_row(
                        "SELECT EXISTS(SELECT 1 FROM chord_sheets WHERE cache_key = ?1 AND saved = 1)",
                        params![key],
                        |row| row.get(0),
                    )
                    .map_err(Error::from)?;
                Ok(saved)
            })
            .await
            .map_err(Error::from)
    }

    async fn touch(&self, artist: &str, title: &str, now: i64) -> Result<(), Error> {
        let key = keys::encode(artist, title);
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    &format!(
                        "UPDATE chord_sheets SET
                        last_accessed = ?2,
                        access_count = access_count + 1,
                        access_seq = {NEXT_ACCESS_SEQ}
                    WHERE cache_key = ?1"
                    ),
                    params![key, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn set_saved(
        &self, artist: &str, title: &str, saved: bool, expires_at: i64, now: i64,
    ) -> Result<bool, Error> {
        let key = keys::encode(artist, title);
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute(
                    &format!(
                        "UPDATE chord_sheets SET
                        saved = ?2,
                        expires_at = ?3,
                        last_accessed = ?4,
                        access_seq = {NEXT_ACCESS_SEQ}
                    WHERE cache_key = ?1"
                    ),
                    params![key, saved, expires_at, now],
                )?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    async fn tier_counts(&self, now: i64) -> Result<TierCounts, Error> {
        self.conn
            .call(move |conn| -> Result<TierCounts, Error> {
                let counts = conn.query_row(
                    "SELECT
                        COALESCE(SUM(CASE WHEN saved = 1 THEN 1 ELSE 0 END), 0),
                        COALESCE(SUM(CASE WHEN saved = 0 THEN 1 ELSE 0 END), 0),
                        COALESCE(SUM(CASE WHEN saved = 0 AND expires_at < ?1 THEN 1 ELSE 0 END), 0)
                    FROM chord_sheets",
                    params![now],
                    |row| {
                        Ok(TierCounts {
                            saved: row.get::<_, i64>(0)? as u64,
                            regular: row.get::<_, i64>(1)? as u64,
                            expired: row.get::<_, i64>(2)? as u64,
                        })
                    },
                )?;
                Ok(counts)
            })
            .await
            .map_err(Error::from)
    }

    async fn evict_least_recently_accessed(&self, max_regular: usize) -> Result<u64, Error> {
        let max = max_regular as i64;
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM chord_sheets WHERE saved = 0", [], |row| row.get(0))?;
                if count <= max {
                    return Ok(0);
                }

                let to_delete = count - max;
                let deleted = conn.execute(
                    "DELETE FROM chord_sheets WHERE cache_key IN (
                    SELECT cache_key FROM chord_sheets WHERE saved = 0 ORDER BY access_seq ASC LIMIT ?1
                )",
                    params![to_delete],
                )?;
                Ok(deleted as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NEVER_EXPIRES;

    fn sheet(artist: &str, title: &str) -> ChordSheet {
        ChordSheet {
            title: title.to_string(),
            artist: artist.to_string(),
            song_chords: "[Am] [F] [C] [G]".to_string(),
            song_key: "Am".to_string(),
            guitar_tuning: vec!["E".into(), "A".into(), "D".into(), "G".into(), "B".into(), "E".into()],
            guitar_capo: 0,
        }
    }

    fn regular(now: i64) -> StoreOptions {
        StoreOptions { saved: false, cached_at: now, expires_at: now + 1_000 }
    }

    #[tokio::test]
    async fn test_store_and_get() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let stored = db
            .store("Radiohead", "Creep", &sheet("Radiohead", "Creep"), regular(10))
            .await
            .unwrap();

        assert_eq!(stored.key, "radiohead_creep");
        assert_eq!(stored.cache_info.expires_at, 1_010);
        assert_eq!(stored.cache_info.version, RECORD_VERSION);

        let retrieved = db.get("RADIOHEAD", "creep").await.unwrap().unwrap();
        assert_eq!(retrieved.chord_sheet, sheet("Radiohead", "Creep"));
        assert!(!retrieved.metadata.saved);
    }

    #[tokio::test]
    async fn test_get_missing() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert!(db.get("nobody", "nothing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_normalized_keys_collide() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.store("Guns N' Roses", "Paradise City", &sheet("Guns N' Roses", "Paradise City"), regular(0))
            .await
            .unwrap();

        assert!(db.get("guns-n-roses", "paradise-city").await.unwrap().is_some());
        assert!(db.delete("guns n roses", "PARADISE CITY").await.unwrap());
        assert!(db.get("Guns N' Roses", "Paradise City").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_overwrite_keeps_access_count() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.store("a", "b", &sheet("a", "b"), regular(0)).await.unwrap();
        db.touch("a", "b", 5).await.unwrap();
        db.touch("a", "b", 6).await.unwrap();

        let mut updated = sheet("a", "b");
        updated.song_key = "C".into();
        let record = db
            .store("a", "b", &updated, StoreOptions { saved: true, cached_at: 7, expires_at: NEVER_EXPIRES })
            .await
            .unwrap();

        assert_eq!(record.metadata.access_count, 2);
        assert!(record.metadata.saved);
        assert_eq!(record.chord_sheet.song_key, "C");
        assert_eq!(record.cache_info.expires_at, NEVER_EXPIRES);
    }

    #[tokio::test]
    async fn test_saved_and_expired_queries() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.store("a", "saved", &sheet("a", "saved"), StoreOptions { saved: true, cached_at: 0, expires_at: NEVER_EXPIRES })
            .await
            .unwrap();
        db.store("a", "old", &sheet("a", "old"), StoreOptions { saved: false, cached_at: 0, expires_at: 100 })
            .await
            .unwrap();
        db.store("a", "fresh", &sheet("a", "fresh"), StoreOptions { saved: false, cached_at: 0, expires_at: 10_000 })
            .await
            .unwrap();

        let saved = db.get_all_saved().await.unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].chord_sheet.title, "saved");
        assert!(db.is_saved("a", "saved").await.unwrap());
        assert!(!db.is_saved("a", "fresh").await.unwrap());

        let expired = db.get_expired_entries(500).await.unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].chord_sheet.title, "old");

        let counts = db.tier_counts(500).await.unwrap();
        assert_eq!(counts, TierCounts { saved: 1, regular: 2, expired: 1 });

        assert_eq!(db.remove_expired_entries(500).await.unwrap(), 1);
        assert!(db.get("a", "old").await.unwrap().is_none());
        assert!(db.get("a", "fresh").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_undecodable_rows_are_skipped() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let saved = StoreOptions { saved: true, cached_at: 0, expires_at: NEVER_EXPIRES };
        db.store("a", "good", &sheet("a", "good"), saved).await.unwrap();
        db.store("a", "broken", &sheet("a", "broken"), saved).await.unwrap();
        db.conn
            .call(|conn| -> Result<(), Error> {
                conn.execute("UPDATE chord_sheets SET chord_sheet_json = '{' WHERE cache_key = 'a_broken'", [])?;
                Ok(())
            })
            .await
            .unwrap();

        let all = db.get_all_saved().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].chord_sheet.title, "good");
        assert!(db.get("a", "broken").await.is_err());
    }

    #[tokio::test]
    async fn test_set_saved() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert!(!db.set_saved("a", "b", true, NEVER_EXPIRES, 1).await.unwrap());

        db.store("a", "b", &sheet("a", "b"), regular(0)).await.unwrap();
        assert!(db.set_saved("a", "b", true, NEVER_EXPIRES, 7).await.unwrap());

        let record = db.get("a", "b").await.unwrap().unwrap();
        assert!(record.metadata.saved);
        assert_eq!(record.cache_info.expires_at, NEVER_EXPIRES);
        assert_eq!(record.metadata.last_accessed, 7);
    }

    #[tokio::test]
    async fn test_evict_least_recently_accessed() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.store("a", "saved", &sheet("a", "saved"), StoreOptions { saved: true, cached_at: 0, expires_at: NEVER_EXPIRES })
            .await
            .unwrap();
        for title in ["one", "two", "three"] {
            db.store("a", title, &sheet("a", title), regular(0)).await.unwrap();
        }
        // "one" becomes the most recent; "two" is now the oldest regular record.
        db.touch("a", "one", 1).await.unwrap();

        assert_eq!(db.evict_least_recently_accessed(2).await.unwrap(), 1);
        assert!(db.get("a", "two").await.unwrap().is_none());
        assert!(db.get("a", "one").await.unwrap().is_some());
        assert!(db.get("a", "three").await.unwrap().is_some());
        assert!(db.get("a", "saved").await.unwrap().is_some());

        assert_eq!(db.evict_least_recently_accessed(2).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_clear() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.store("a", "b", &sheet("a", "b"), regular(0)).await.unwrap();
        db.store("a", "c", &sheet("a", "c"), regular(0)).await.unwrap();
        assert_eq!(db.clear().await.unwrap(), 2);
        assert_eq!(db.tier_counts(0).await.unwrap(), TierCounts::default());
    }
}
