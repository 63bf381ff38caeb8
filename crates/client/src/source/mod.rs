//! The scraping source that backs the artist song cache.

pub mod links;

use async_trait::async_trait;
use chordium_core::{Error, Song};
use url::Url;

pub use links::{LinkHarvestSource, harvest_songs};

/// Authoritative provider of artist song lists.
#[async_trait]
pub trait SongSource: Send + Sync {
    /// Songs listed on the artist page at `artist_url`. An unknown artist yields an empty list.
    async fn get_artist_songs(&self, artist_url: &Url) -> Result<Vec<Song>, Error>;
}
