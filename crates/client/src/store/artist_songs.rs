//! Object layout for cached artist song lists.
//!
//! One object per artist at `artist-songs/{artist_key}.json`. The body is a JSON
//! array of `{title, path, artist}`; song URLs are never stored. Summary
//! attributes (`artist`, `song-count`, `last-updated`) live in object metadata.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use chordium_core::models::CachedSong;
use chrono::{DateTime, SecondsFormat, Utc};

use super::{ObjectStore, StoreError, StoreResult};

pub const ARTIST_SONGS_PREFIX: &str = "artist-songs/";
pub const ARTIST_SONGS_EXTENSION: &str = ".json";

const CONTENT_TYPE: &str = "application/json";
const META_ARTIST: &str = "artist";
const META_SONG_COUNT: &str = "song-count";
const META_LAST_UPDATED: &str = "last-updated";

/// Object key for an artist.
pub fn object_key(artist_key: &str) -> String {
    format!("{ARTIST_SONGS_PREFIX}{artist_key}{ARTIST_SONGS_EXTENSION}")
}

/// Inverse of [`object_key`]. `None` for keys outside the layout.
pub fn artist_key_from_object(key: &str) -> Option<&str> {
    key.strip_prefix(ARTIST_SONGS_PREFIX)?
        .strip_suffix(ARTIST_SONGS_EXTENSION)
        .filter(|artist| !artist.is_empty())
}

/// Attributes stored next to an artist's song list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtistSongsMetadata {
    pub artist: String,
    pub song_count: usize,
    pub last_updated: DateTime<Utc>,
}

impl ArtistSongsMetadata {
    fn to_attributes(&self) -> HashMap<String, String> {
        HashMap::from([
            (META_ARTIST.to_string(), self.artist.clone()),
            (META_SONG_COUNT.to_string(), self.song_count.to_string()),
            (META_LAST_UPDATED.to_string(), self.last_updated.to_rfc3339_opts(SecondsFormat::Millis, true)),
        ])
    }

    fn from_attributes(attributes: &HashMap<String, String>) -> Option<Self> {
        Some(Self {
            artist: attributes.get(META_ARTIST)?.clone(),
            song_count: attributes.get(META_SONG_COUNT)?.parse().ok()?,
            last_updated: DateTime::parse_from_rfc3339(attributes.get(META_LAST_UPDATED)?)
                .ok()?
                .with_timezone(&Utc),
        })
    }
}

/// Typed access to artist song lists over any [`ObjectStore`].
#[derive(Clone)]
pub struct ArtistSongStore {
    store: Arc<dyn ObjectStore>,
}

impl ArtistSongStore {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    /// Read an artist's song list. A body that is not a song array is `Malformed`.
    pub async fn read(&self, artist_key: &str) -> StoreResult<Vec<CachedSong>> {
        let key = object_key(artist_key);
        let body = self.store.get(&key).await?;
        serde_json::from_slice(&body).map_err(|e| StoreError::Malformed { key, reason: e.to_string() })
    }

    /// Replace an artist's song list.
    pub async fn write(&self, artist_key: &str, songs: &[CachedSong]) -> StoreResult<ArtistSongsMetadata> {
        let body = serde_json::to_vec(songs)?;
        let metadata =
            ArtistSongsMetadata { artist: artist_key.to_string(), song_count: songs.len(), last_updated: Utc::now() };

        self.store
            .put(&object_key(artist_key), Bytes::from(body), CONTENT_TYPE, &metadata.to_attributes())
            .await?;
        Ok(metadata)
    }

    /// Stored attributes of an artist's list, without reading the body.
    pub async fn metadata(&self, artist_key: &str) -> StoreResult<ArtistSongsMetadata> {
        let key = object_key(artist_key);
        let info = self.store.head(&key).await?;
        ArtistSongsMetadata::from_attributes(&info.metadata)
            .ok_or_else(|| StoreError::Malformed { key, reason: "missing or invalid metadata".into() })
    }

    /// Keys of every artist with a stored list.
    pub async fn list_artists(&self) -> StoreResult<Vec<String>> {
        let keys = self.store.list(ARTIST_SONGS_PREFIX).await?;
        Ok(keys.iter().filter_map(|key| artist_key_from_object(key)).map(str::to_string).collect())
    }

    pub async fn delete(&self, artist_key: &str) -> StoreResult<()> {
        self.store.delete(&object_key(artist_key)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryObjectStore;

    fn song(title: &str, path: &str) -> CachedSong {
        CachedSong { title: title.into(), path: path.into(), artist: "Radiohead".into() }
    }

    #[test]
    fn test_object_key_round_trip() {
        assert_eq!(object_key("radiohead"), "artist-songs/radiohead.json");
        assert_eq!(artist_key_from_object("artist-songs/radiohead.json"), Some("radiohead"));
        assert_eq!(artist_key_from_object("artist-songs/.json"), None);
        assert_eq!(artist_key_from_object("artist-songs/radiohead.txt"), None);
        assert_eq!(artist_key_from_object("other/radiohead.json"), None);
    }

    #[tokio::test]
    async fn test_write_sets_metadata() {
        let memory = Arc::new(MemoryObjectStore::new());
        let store = ArtistSongStore::new(memory.clone());

        store.write("radiohead", &[song("Creep", "creep"), song("Karma Police", "karma-police")]).await.unwrap();

        let metadata = store.metadata("radiohead").await.unwrap();
        assert_eq!(metadata.artist, "radiohead");
        assert_eq!(metadata.song_count, 2);

        let info = memory.head("artist-songs/radiohead.json").await.unwrap();
        assert!(info.metadata["last-updated"].ends_with('Z'));
        assert_eq!(store.read("radiohead").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_read_malformed() {
        let memory = Arc::new(MemoryObjectStore::new());
        memory.insert_raw("artist-songs/broken.json", "{\"not\": \"a list\"}");
        let store = ArtistSongStore::new(memory);

        let err = store.read("broken").await.unwrap_err();
        assert!(matches!(err, StoreError::Malformed { .. }));
        assert!(store.read("absent").await.unwrap_err().is_not_found());
        assert!(matches!(store.metadata("broken").await, Err(StoreError::Malformed { .. })));
    }

    #[tokio::test]
    async fn test_list_and_delete() {
        let memory = Arc::new(MemoryObjectStore::new());
        memory.insert_raw("unrelated.json", "[]");
        let store = ArtistSongStore::new(memory);
        store.write("muse", &[song("Uprising", "uprising")]).await.unwrap();
        store.write("oasis", &[song("Wonderwall", "wonderwall")]).await.unwrap();

        assert_eq!(store.list_artists().await.unwrap(), vec!["muse", "oasis"]);
        store.delete("muse").await.unwrap();
        assert_eq!(store.list_artists().await.unwrap(), vec!["oasis"]);
    }
}
