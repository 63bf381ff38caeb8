//! Song harvesting from artist page links.
//!
//! Anchors that point at a direct child of the artist path are songs: on
//! `/radiohead/`, `<a href="/radiohead/creep/">Creep</a>` is the song `creep`.

use std::collections::HashSet;

use async_trait::async_trait;
use chordium_core::{Error, Song};
use scraper::{Html, Selector};
use url::Url;

use super::SongSource;
use crate::fetch::{FetchClient, song_url};

/// [`SongSource`] that fetches an artist page and harvests its song links.
#[derive(Debug, Clone)]
pub struct LinkHarvestSource {
    fetch: FetchClient,
}

impl LinkHarvestSource {
    pub fn new(fetch: FetchClient) -> Self {
        Self { fetch }
    }
}

#[async_trait]
impl SongSource for LinkHarvestSource {
    async fn get_artist_songs(&self, artist_url: &Url) -> Result<Vec<Song>, Error> {
        let html = self.fetch.fetch_text(artist_url.as_str()).await?;
        let songs = harvest_songs(&html, artist_url);
        tracing::debug!(url = %artist_url, count = songs.len(), "harvested artist songs");
        Ok(songs)
    }
}

fn path_segments(url: &Url) -> Vec<String> {
    url.path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).map(str::to_string).collect())
        .unwrap_or_default()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Artist display name: the page's first `<h1>`, else the last artist path segment.
fn artist_name(document: &Html, artist_segments: &[String]) -> String {
    let heading = Selector::parse("h1")
        .ok()
        .and_then(|selector| document.select(&selector).next())
        .map(|h1| collapse_whitespace(&h1.text().collect::<String>()))
        .filter(|name| !name.is_empty());

    heading.unwrap_or_else(|| artist_segments.last().map(|s| s.replace('-', " ")).unwrap_or_default())
}

/// Extract the songs linked from an artist page, in document order, one per path.
pub fn harvest_songs(html: &str, artist_url: &Url) -> Vec<Song> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let artist_segments = path_segments(artist_url);
    if artist_segments.is_empty() {
        return Vec::new();
    }

    let artist = artist_name(&document, &artist_segments);
    let origin = artist_url.origin().ascii_serialization();
    let artist_path = artist_segments.join("/");

    let mut seen = HashSet::new();
    let mut songs = Vec::new();

    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };

        let Ok(resolved) = artist_url.join(href) else {
            continue;
        };

        if resolved.host_str() != artist_url.host_str() {
            continue;
        }

        let segments = path_segments(&resolved);
        if segments.len() != artist_segments.len() + 1 || !segments.starts_with(&artist_segments) {
            continue;
        }

        let path = segments[artist_segments.len()].clone();
        let title = collapse_whitespace(&element.text().collect::<String>());
        if title.is_empty() || !seen.insert(path.clone()) {
            continue;
        }

        let url = song_url(&origin, &artist_path, &path);
        songs.push(Song { title, path, artist: artist.clone(), url: Some(url) });
    }

    songs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artist() -> Url {
        Url::parse("https://www.cifraclub.com.br/radiohead/").unwrap()
    }

    #[test]
    fn test_harvest_child_links() {
        let html = r#"
            <html>
                <body>
                    <h1> Radiohead </h1>
                    <a href="/radiohead/creep/">Creep</a>
                    <a href="karma-police/">Karma
                        Police</a>
                    <a href="/radiohead/">Radiohead</a>
                    <a href="/muse/uprising/">Uprising</a>
                    <a href="/radiohead/creep/letra/">Creep lyrics</a>
                </body>
            </html>
        "#;

        let songs = harvest_songs(html, &artist());
        assert_eq!(songs.len(), 2);
        assert_eq!(songs[0].title, "Creep");
        assert_eq!(songs[0].path, "creep");
        assert_eq!(songs[0].artist, "Radiohead");
        assert_eq!(songs[0].url.as_deref(), Some("https://www.cifraclub.com.br/radiohead/creep/"));
        assert_eq!(songs[1].title, "Karma Police");
        assert_eq!(songs[1].path, "karma-police");
    }

    #[test]
    fn test_harvest_duplicates_and_empty_text() {
        let html = r#"
            <a href="/radiohead/creep/"><img src="cover.jpg"></a>
            <a href="/radiohead/creep/">Creep</a>
            <a href="/radiohead/creep/?capo=2">Creep again</a>
        "#;

        let songs = harvest_songs(html, &artist());
        assert_eq!(songs.len(), 1);
        assert_eq!(songs[0].title, "Creep");
    }

    #[test]
    fn test_harvest_other_hosts_ignored() {
        let html = r#"<a href="https://example.com/radiohead/creep/">Creep</a>"#;
        assert!(harvest_songs(html, &artist()).is_empty());
    }

    #[test]
    fn test_artist_name_fallback() {
        let url = Url::parse("https://www.cifraclub.com.br/guns-n-roses/").unwrap();
        let html = r#"<a href="/guns-n-roses/paradise-city/">Paradise City</a>"#;

        let songs = harvest_songs(html, &url);
        assert_eq!(songs[0].artist, "guns n roses");
    }

    #[test]
    fn test_harvest_no_links() {
        assert!(harvest_songs("<p>Nothing here</p>", &artist()).is_empty());
    }
}
