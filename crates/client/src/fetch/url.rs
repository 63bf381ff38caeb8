//! Scraping-source URL layout.
//!
//! Artist pages live at `{base}/{artist_path}/` and songs at
//! `{base}/{artist_key}/{song_path}/`. Outbound URLs are canonicalized before
//! fetching: https by default, lowercase host, no fragment.

use url::Url;

#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Parse `input` as an http(s) URL, defaulting to https and dropping the fragment.
///
/// The query string is kept as given.
pub fn canonicalize(input: &str) -> Result<Url, UrlError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(UrlError::Empty);
    }

    let with_scheme = if input.contains("://") { input.to_string() } else { format!("https://{input}") };
    let mut url = Url::parse(&with_scheme).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(UrlError::UnsupportedScheme(url.scheme().to_string()));
    }

    // Domain hosts are already lowercased by the parser; this covers the rest.
    if let Some(host) = url.host_str().map(str::to_lowercase) {
        url.set_host(Some(&host)).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    }
    url.set_fragment(None);

    Ok(url)
}

fn join_segments(base: &str, segments: &[&str]) -> String {
    let mut url = base.trim().trim_end_matches('/').to_string();
    for segment in segments {
        url.push('/');
        url.push_str(segment.trim().trim_matches('/'));
    }
    url.push('/');
    url
}

/// Artist page URL: `{base}/{artist_path}/`.
pub fn artist_url(base: &str, artist_path: &str) -> Result<Url, UrlError> {
    if artist_path.trim().trim_matches('/').trim().is_empty() {
        return Err(UrlError::Empty);
    }
    canonicalize(&join_segments(base, &[artist_path]))
}

/// Playable song URL: `{base}/{artist_key}/{song_path}/`.
pub fn song_url(base: &str, artist_key: &str, song_path: &str) -> String {
    join_segments(base, &[artist_key, song_path])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artist_url() {
        let url = artist_url("https://www.cifraclub.com.br", "radiohead").unwrap();
        assert_eq!(url.as_str(), "https://www.cifraclub.com.br/radiohead/");

        let url = artist_url("https://www.cifraclub.com.br/", "/radiohead/").unwrap();
        assert_eq!(url.as_str(), "https://www.cifraclub.com.br/radiohead/");
    }

    #[test]
    fn test_artist_url_canonical_form() {
        let url = artist_url("WWW.CifraClub.com.br", "legiao-urbana").unwrap();
        assert_eq!(url.as_str(), "https://www.cifraclub.com.br/legiao-urbana/");

        let url = artist_url("HTTP://localhost:8080", "muse").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/muse/");
    }

    #[test]
    fn test_artist_url_rejects_bad_input() {
        assert!(matches!(artist_url("https://www.cifraclub.com.br", " / "), Err(UrlError::Empty)));
        assert!(matches!(artist_url("ftp://mirror.example", "muse"), Err(UrlError::UnsupportedScheme(_))));
        assert!(matches!(canonicalize("   "), Err(UrlError::Empty)));
    }

    #[test]
    fn test_song_url() {
        assert_eq!(
            song_url("https://www.cifraclub.com.br/", "radiohead", "creep"),
            "https://www.cifraclub.com.br/radiohead/creep/"
        );
        assert_eq!(
            song_url("https://www.cifraclub.com.br", "radiohead/", "/karma-police/"),
            "https://www.cifraclub.com.br/radiohead/karma-police/"
        );
    }
}
