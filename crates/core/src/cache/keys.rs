//! Cache key normalization for (artist, title) pairs.
//!
//! A key is `normalize(artist) + "_" + normalize(title)`. Normalization folds
//! case and diacritics, drops apostrophes and turns every other run of
//! non-alphanumeric characters into a single `-`, so "Guns N' Roses" and
//! "guns-n-roses" land on the same key.
//!
//! Normalized components never contain `_`, which keeps `decode` unambiguous
//! for keys produced by `encode`. Decoding is lossy: the original spelling,
//! casing and punctuation are gone.

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Separator between the artist and title components.
pub const KEY_SEPARATOR: char = '_';

/// Best-effort inverse of [`encode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedKey {
    pub artist: String,
    pub title: String,
}

/// Normalize one free-form component into its key form.
///
/// Idempotent: `normalize_component(&normalize_component(s)) == normalize_component(s)`.
pub fn normalize_component(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_dash = false;

    for c in input.nfkd().filter(|c| !is_combining_mark(*c)) {
        if is_apostrophe(c) {
            continue;
        }
        if c.is_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }

    out
}

/// Build the cache key for an (artist, title) pair. Order-sensitive.
pub fn encode(artist: &str, title: &str) -> String {
    format!("{}{}{}", normalize_component(artist), KEY_SEPARATOR, normalize_component(title))
}

/// Recover a readable (artist, title) pair from a key.
///
/// Returns `None` when the key has no separator. Dashes come back as spaces.
pub fn decode(key: &str) -> Option<DecodedKey> {
    let (artist, title) = key.split_once(KEY_SEPARATOR)?;
    Some(DecodedKey { artist: artist.replace('-', " "), title: title.replace('-', " ") })
}

/// True when both keys refer to the same normalized (artist, title).
pub fn same_key(a: (&str, &str), b: (&str, &str)) -> bool {
    encode(a.0, a.1) == encode(b.0, b.1)
}

fn is_apostrophe(c: char) -> bool {
    matches!(c, '\'' | '\u{2018}' | '\u{2019}' | '`' | '\u{00B4}')
}
