//! Domain payloads shared by the server gateway and the local cache.

use serde::{Deserialize, Serialize};

/// Sentinel `expires_at` for records that never expire (JavaScript's `Number.MAX_SAFE_INTEGER`).
pub const NEVER_EXPIRES: i64 = 9_007_199_254_740_991;

/// Current record layout version written into `CacheInfo::version`.
pub const RECORD_VERSION: u32 = 1;

/// A song entry from an artist's song list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Song {
    pub title: String,
    pub path: String,
    pub artist: String,
    /// Canonical playable URL. Never persisted in the object store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Song {
    /// A song can be cached only with a title and a path.
    pub fn is_complete(&self) -> bool {
        !self.title.trim().is_empty() && !self.path.trim().is_empty()
    }
}

/// The object-store form of a [`Song`]: the `url` field does not exist here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedSong {
    pub title: String,
    pub path: String,
    pub artist: String,
}

impl From<&Song> for CachedSong {
    fn from(song: &Song) -> Self {
        Self { title: song.title.clone(), path: song.path.clone(), artist: song.artist.clone() }
    }
}

impl CachedSong {
    /// Rebuild the full song, with `url` derived from the source base URL.
    pub fn into_song(self, url: Option<String>) -> Song {
        Song { title: self.title, path: self.path, artist: self.artist, url }
    }
}

/// A full chord sheet as displayed to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChordSheet {
    pub title: String,
    pub artist: String,
    pub song_chords: String,
    #[serde(default)]
    pub song_key: String,
    #[serde(default)]
    pub guitar_tuning: Vec<String>,
    #[serde(default)]
    pub guitar_capo: u32,
}

/// Retention tier and usage tracking for a cached chord sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMetadata {
    /// `true` for the saved tier, `false` for the regular (transient) tier.
    pub saved: bool,
    pub last_accessed: i64,
    pub access_count: u64,
}

/// Write-time bookkeeping for a cached chord sheet. Times are epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheInfo {
    pub cached_at: i64,
    pub expires_at: i64,
    pub version: u32,
}

impl CacheInfo {
    pub fn is_expired(&self, now: i64) -> bool {
        now > self.expires_at
    }
}

/// One row of the chord-sheet repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChordSheetRecord {
    pub key: String,
    pub chord_sheet: ChordSheet,
    pub metadata: RecordMetadata,
    pub cache_info: CacheInfo,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cached_song_drops_url() {
        let song = Song {
            title: "Creep".into(),
            path: "creep".into(),
            artist: "Radiohead".into(),
            url: Some("https://example.com/radiohead/creep/".into()),
        };
        let cached = CachedSong::from(&song);
        let json = serde_json::to_value(&cached).unwrap();
        assert!(json.get("url").is_none());
        assert_eq!(json["title"], "Creep");
        assert_eq!(json["path"], "creep");
        assert_eq!(json["artist"], "Radiohead");
    }

    #[test]
    fn test_song_without_url_serializes_without_field() {
        let song = Song { title: "a".into(), path: "b".into(), artist: "c".into(), url: None };
        let json = serde_json::to_string(&song).unwrap();
        assert!(!json.contains("url"));
    }

    #[test]
    fn test_song_completeness() {
        let mut song = Song { title: "Creep".into(), path: "creep".into(), artist: "Radiohead".into(), url: None };
        assert!(song.is_complete());
        song.path = "  ".into();
        assert!(!song.is_complete());
    }

    #[test]
    fn test_chord_sheet_camel_case() {
        let json = r#"{"title":"Creep","artist":"Radiohead","songChords":"[G]...","songKey":"G","guitarCapo":2}"#;
        let sheet: ChordSheet = serde_json::from_str(json).unwrap();
        assert_eq!(sheet.song_chords, "[G]...");
        assert_eq!(sheet.guitar_capo, 2);
        assert!(sheet.guitar_tuning.is_empty());
    }

    #[test]
    fn test_never_expires_sentinel() {
        let info = CacheInfo { cached_at: 0, expires_at: NEVER_EXPIRES, version: RECORD_VERSION };
        assert!(!info.is_expired(NEVER_EXPIRES));
        assert!(info.is_expired(NEVER_EXPIRES + 1));
    }
}
