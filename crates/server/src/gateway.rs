//! Cache-aside gateway for artist song lists.
//!
//! Reads go to the object store first and fall back to the scraping source.
//! Non-empty scrape results are written back without their URLs; URLs are
//! rebuilt from the source base URL when a cached list is served. Only a
//! failing source surfaces as an error from [`ArtistSongCacheGateway::get_songs`].

use std::collections::HashMap;
use std::sync::{Arc, MutexGuard};

use chordium_client::SongSource;
use chordium_client::fetch::{artist_url, song_url};
use chordium_client::store::{ArtistSongStore, LazyObjectStore, StoreError};
use chordium_core::models::CachedSong;
use chordium_core::{Error, Song};
use tokio::sync::Mutex;

/// Errors surfaced by the gateway.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error(transparent)]
    Source(#[from] Error),

    #[error("object store error: {0}")]
    Store(#[from] StoreError),
}

/// Strip surrounding whitespace and slashes from an artist path.
pub fn normalize_artist_path(artist_path: &str) -> String {
    artist_path.trim().trim_matches('/').trim().to_string()
}

/// Whether a song list is worth caching. Empty lists are never cached, so an
/// empty cached list is treated as a miss.
pub fn is_cacheable_result<T>(songs: &[T]) -> bool {
    !songs.is_empty()
}

fn same_path(a: &str, b: &str) -> bool {
    a.trim().trim_matches('/') == b.trim().trim_matches('/')
}

type InflightMap = std::sync::Mutex<HashMap<String, Arc<Mutex<()>>>>;

fn lock_inflight(map: &InflightMap) -> MutexGuard<'_, HashMap<String, Arc<Mutex<()>>>> {
    map.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// One request's hold on an artist's in-flight lock.
///
/// Dropping the claim, on completion or cancellation, removes the map entry
/// once no other request holds it.
struct InflightClaim<'a> {
    map: &'a InflightMap,
    key: String,
    lock: Arc<Mutex<()>>,
}

impl<'a> InflightClaim<'a> {
    fn acquire(map: &'a InflightMap, key: &str) -> Self {
        let lock = Arc::clone(lock_inflight(map).entry(key.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))));
        Self { map, key: key.to_string(), lock }
    }
}

impl Drop for InflightClaim<'_> {
    fn drop(&mut self) {
        let mut map = lock_inflight(self.map);
        // The map and this claim are the only holders left.
        if map.get(&self.key).is_some_and(|entry| Arc::ptr_eq(entry, &self.lock) && Arc::strong_count(entry) == 2) {
            map.remove(&self.key);
        }
    }
}

/// Gateway settings.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Scraping source base URL, used for artist pages and rebuilt song URLs.
    pub base_url: String,
    /// Serialize concurrent misses per artist so only one of them scrapes.
    pub single_flight: bool,
}

/// Cache-aside orchestration over the object store and the scraping source.
pub struct ArtistSongCacheGateway {
    store: Arc<LazyObjectStore>,
    source: Arc<dyn SongSource>,
    base_url: String,
    inflight: Option<InflightMap>,
}

impl ArtistSongCacheGateway {
    pub fn new(store: Arc<LazyObjectStore>, source: Arc<dyn SongSource>, config: GatewayConfig) -> Self {
        Self {
            store,
            source,
            base_url: config.base_url,
            inflight: config.single_flight.then(|| std::sync::Mutex::new(HashMap::new())),
        }
    }

    pub async fn store_enabled(&self) -> bool {
        self.store.is_enabled().await
    }

    async fn songs_store(&self) -> Option<ArtistSongStore> {
        self.store.get().await.map(ArtistSongStore::new)
    }

    /// Songs for an artist, from the cache when possible.
    pub async fn get_songs(&self, artist_path: &str) -> Result<Vec<Song>, GatewayError> {
        let artist_key = normalize_artist_path(artist_path);
        if artist_key.is_empty() {
            tracing::warn!(artist_path, "song lookup without artist path");
            return Ok(Vec::new());
        }

        let store = self.songs_store().await;
        if let Some(songs) = self.read_cached(store.as_ref(), &artist_key).await {
            return Ok(songs);
        }

        let Some(inflight) = &self.inflight else {
            return self.fetch_and_store(store.as_ref(), &artist_key).await;
        };

        let claim = InflightClaim::acquire(inflight, &artist_key);
        let _guard = claim.lock.lock().await;
        // Another request may have filled the cache while this one waited.
        match self.read_cached(store.as_ref(), &artist_key).await {
            Some(songs) => Ok(songs),
            None => self.fetch_and_store(store.as_ref(), &artist_key).await,
        }
    }

    async fn read_cached(&self, store: Option<&ArtistSongStore>, artist_key: &str) -> Option<Vec<Song>> {
        let store = store?;

        match store.read(artist_key).await {
            Ok(cached) if is_cacheable_result(&cached) => {
                tracing::debug!(artist = %artist_key, count = cached.len(), "artist songs cache hit");
                Some(
                    cached
                        .into_iter()
                        .map(|song| {
                            let url = song_url(&self.base_url, artist_key, &song.path);
                            song.into_song(Some(url))
                        })
                        .collect(),
                )
            }
            Ok(_) => {
                tracing::debug!(artist = %artist_key, "cached song list is empty, treating as miss");
                None
            }
            Err(e) if e.is_not_found() => {
                tracing::debug!(artist = %artist_key, "artist songs cache miss");
                None
            }
            Err(e) => {
                tracing::error!(artist = %artist_key, error = %e, "failed to read cached artist songs");
                None
            }
        }
    }

    async fn fetch_and_store(
        &self, store: Option<&ArtistSongStore>, artist_key: &str,
    ) -> Result<Vec<Song>, GatewayError> {
        let url = artist_url(&self.base_url, artist_key).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let songs = self.source.get_artist_songs(&url).await?;

        if !is_cacheable_result(&songs) {
            tracing::debug!(artist = %artist_key, "source returned no songs, not caching");
            return Ok(songs);
        }

        if let Some(store) = store
            && let Err(e) = write_songs(store, artist_key, &songs).await
        {
            tracing::error!(artist = %artist_key, error = %e, "failed to write back artist songs");
        }

        Ok(songs)
    }

    /// Replace an artist's cached list. URLs are dropped before writing.
    ///
    /// Returns `false` when the store is disabled or the artist key is empty.
    pub async fn store_artist_songs(&self, artist_path: &str, songs: &[Song]) -> Result<bool, GatewayError> {
        let artist_key = normalize_artist_path(artist_path);
        if artist_key.is_empty() {
            return Ok(false);
        }
        let Some(store) = self.songs_store().await else {
            return Ok(false);
        };

        write_songs(&store, &artist_key, songs).await?;
        Ok(true)
    }

    /// Append a song to an artist's cached list.
    ///
    /// Returns `false` for an incomplete song, an uncached artist, a duplicate
    /// path, or a disabled store.
    pub async fn add_song(&self, artist_name: &str, song: &Song) -> Result<bool, GatewayError> {
        let artist_key = normalize_artist_path(artist_name);
        if artist_key.is_empty() || !song.is_complete() {
            tracing::warn!(artist = %artist_key, title = %song.title, path = %song.path, "rejecting incomplete song");
            return Ok(false);
        }

        let Some(store) = self.songs_store().await else {
            return Ok(false);
        };
        let Some(mut songs) = read_existing(&store, &artist_key).await? else {
            return Ok(false);
        };

        if songs.iter().any(|existing| same_path(&existing.path, &song.path)) {
            tracing::debug!(artist = %artist_key, path = %song.path, "song already cached");
            return Ok(false);
        }

        songs.push(CachedSong::from(song));
        store.write(&artist_key, &songs).await?;
        tracing::info!(artist = %artist_key, path = %song.path, count = songs.len(), "added song to artist cache");
        Ok(true)
    }

    /// Remove a song from an artist's cached list by path.
    ///
    /// Returns `false` when the artist is uncached, the path is absent, or the store is disabled.
    pub async fn remove_song(&self, artist_name: &str, song_path: &str) -> Result<bool, GatewayError> {
        let artist_key = normalize_artist_path(artist_name);
        if artist_key.is_empty() || song_path.trim().is_empty() {
            tracing::warn!(artist = %artist_key, path = %song_path, "song removal without artist or path");
            return Ok(false);
        }

        let Some(store) = self.songs_store().await else {
            return Ok(false);
        };
        let Some(mut songs) = read_existing(&store, &artist_key).await? else {
            return Ok(false);
        };

        let before = songs.len();
        songs.retain(|song| !same_path(&song.path, song_path));
        if songs.len() == before {
            return Ok(false);
        }

        store.write(&artist_key, &songs).await?;
        tracing::info!(artist = %artist_key, path = %song_path, count = songs.len(), "removed song from artist cache");
        Ok(true)
    }

    /// Keys of every cached artist. Empty when the store is disabled.
    pub async fn list_artists(&self) -> Result<Vec<String>, GatewayError> {
        let Some(store) = self.songs_store().await else {
            return Ok(Vec::new());
        };
        Ok(store.list_artists().await?)
    }

    /// Drop an artist's cached list. Returns `false` when nothing was cached.
    pub async fn delete_artist(&self, artist_path: &str) -> Result<bool, GatewayError> {
        let artist_key = normalize_artist_path(artist_path);
        if artist_key.is_empty() {
            return Ok(false);
        }
        let Some(store) = self.songs_store().await else {
            return Ok(false);
        };

        match store.delete(&artist_key).await {
            Ok(()) => {
                tracing::info!(artist = %artist_key, "deleted artist songs");
                Ok(true)
            }
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

async fn write_songs(store: &ArtistSongStore, artist_key: &str, songs: &[Song]) -> Result<(), StoreError> {
    let stripped: Vec<CachedSong> = songs.iter().map(CachedSong::from).collect();
    let metadata = store.write(artist_key, &stripped).await?;
    tracing::info!(artist = %artist_key, count = metadata.song_count, backend = store.backend_name(), "cached artist songs");
    Ok(())
}

/// The cached list, or `None` when the artist has no entry.
async fn read_existing(store: &ArtistSongStore, artist_key: &str) -> Result<Option<Vec<CachedSong>>, StoreError> {
    match store.read(artist_key).await {
        Ok(songs) => Ok(Some(songs)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}
