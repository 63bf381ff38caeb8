//! Recognized pre-repository storage layouts.
//!
//! Each legacy key holds one JSON document in one of three shapes. A document
//! is parsed into a [`LegacyPayload`], whose entries are then decoded one by
//! one so a single bad item never hides the rest of the document.

use serde::Deserialize;
use serde_json::Value;

use crate::Error;
use crate::cache::keys;
use crate::models::ChordSheet;

/// Flag key written once a migration finishes without errors.
pub const MIGRATION_COMPLETED_KEY: &str = "chordium-indexeddb-migration-completed";

/// Value stored under [`MIGRATION_COMPLETED_KEY`].
pub const MIGRATION_COMPLETED_VALUE: &str = "true";

/// The legacy keys a migration scans, in scan order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LegacyKey {
    /// `chordium-chord-sheet-cache`: `{ "items": [ { "data", "saved" } ] }`
    UnifiedCache,
    /// `chord-sheet-cache`: `{ "<key>": { "data", "saved" } }`
    KeyedCache,
    /// `my-chord-sheets`: array of saved sheets.
    MyChordSheets,
    /// `myChordSheets`: array of saved sheets.
    MyChordSheetsCamel,
    /// `my-chord-sheets-cache`: array of saved sheets.
    MyChordSheetsCache,
}

impl LegacyKey {
    pub const ALL: [LegacyKey; 5] = [
        LegacyKey::UnifiedCache,
        LegacyKey::KeyedCache,
        LegacyKey::MyChordSheets,
        LegacyKey::MyChordSheetsCamel,
        LegacyKey::MyChordSheetsCache,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LegacyKey::UnifiedCache => "chordium-chord-sheet-cache",
            LegacyKey::KeyedCache => "chord-sheet-cache",
            LegacyKey::MyChordSheets => "my-chord-sheets",
            LegacyKey::MyChordSheetsCamel => "myChordSheets",
            LegacyKey::MyChordSheetsCache => "my-chord-sheets-cache",
        }
    }

    /// Exact, case-sensitive match against the known keys.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|candidate| candidate.as_str() == key)
    }
}

impl std::fmt::Display for LegacyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A chord sheet as older releases wrote it. Every field is optional on the wire.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyChordSheet {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub song_chords: Option<String>,
    /// Name of the chord body before `songChords` existed.
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub song_key: Option<String>,
    #[serde(default)]
    pub guitar_tuning: Option<Vec<String>>,
    #[serde(default)]
    pub guitar_capo: Option<u32>,
}

/// A name that still has something left once normalized into a key component.
fn keyable(value: Option<String>) -> Option<String> {
    value.filter(|v| !keys::normalize_component(v).is_empty())
}

impl LegacyChordSheet {
    /// Requires a title, an artist and a chord body (`songChords`, else `content`).
    pub fn validate(self) -> Result<ChordSheet, String> {
        let title = keyable(self.title).ok_or("missing title")?;
        let artist = keyable(self.artist).ok_or("missing artist")?;
        let song_chords = self.song_chords.or(self.content).ok_or("missing songChords and content")?;

        Ok(ChordSheet {
            title,
            artist,
            song_chords,
            song_key: self.song_key.unwrap_or_default(),
            guitar_tuning: self.guitar_tuning.unwrap_or_default(),
            guitar_capo: self.guitar_capo.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ItemMetadata {
    #[serde(default)]
    saved: bool,
}

/// One element of the unified-cache `items` array.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UnifiedCacheItem {
    #[serde(alias = "chordSheet")]
    data: LegacyChordSheet,
    #[serde(default)]
    saved: Option<bool>,
    #[serde(default)]
    metadata: Option<ItemMetadata>,
}

impl UnifiedCacheItem {
    fn saved(&self) -> bool {
        self.saved.or(self.metadata.as_ref().map(|m| m.saved)).unwrap_or(false)
    }
}

/// One value of the keyed cache object.
#[derive(Debug, Deserialize)]
struct KeyedCacheItem {
    #[serde(alias = "chordSheet")]
    data: LegacyChordSheet,
    #[serde(default)]
    saved: bool,
}

/// A parsed legacy document, still holding undecoded items.
#[derive(Debug, Clone, PartialEq)]
pub enum LegacyPayload {
    UnifiedCache(Vec<Value>),
    KeyedCache(Vec<(String, Value)>),
    SavedList(Vec<Value>),
}

/// A decoded legacy item ready to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyItem {
    pub chord_sheet: ChordSheet,
    pub saved: bool,
}

/// Outcome of decoding one legacy item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LegacyEntry {
    Valid(LegacyItem),
    /// Well-formed but lacking required fields.
    Invalid { label: String, reason: String },
    /// Not decodable as the expected item type.
    Malformed { label: String, error: String },
}

impl LegacyPayload {
    /// Parse the container document stored under `key`.
    pub fn parse(key: LegacyKey, raw: &str) -> Result<Self, Error> {
        let document: Value = serde_json::from_str(raw)?;
        let shape_error = |expected: &str| Error::Serialization(format!("{key}: expected {expected}"));

        match key {
            LegacyKey::UnifiedCache => {
                let items = document
                    .get("items")
                    .and_then(Value::as_array)
                    .ok_or_else(|| shape_error("an object with an `items` array"))?;
                Ok(LegacyPayload::UnifiedCache(items.clone()))
            }
            LegacyKey::KeyedCache => match document {
                Value::Object(map) => Ok(LegacyPayload::KeyedCache(map.into_iter().collect())),
                _ => Err(shape_error("an object")),
            },
            LegacyKey::MyChordSheets | LegacyKey::MyChordSheetsCamel | LegacyKey::MyChordSheetsCache => {
                match document {
                    Value::Array(items) => Ok(LegacyPayload::SavedList(items)),
                    _ => Err(shape_error("an array")),
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        match self {
            LegacyPayload::UnifiedCache(items) | LegacyPayload::SavedList(items) => items.len(),
            LegacyPayload::KeyedCache(entries) => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decode every item. `source` prefixes the labels used in logs and errors.
    pub fn into_entries(self, source: LegacyKey) -> Vec<LegacyEntry> {
        match self {
            LegacyPayload::UnifiedCache(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, value)| {
                    let label = format!("{source}[{i}]");
                    match serde_json::from_value::<UnifiedCacheItem>(value) {
                        Ok(item) => {
                            let saved = item.saved();
                            decode(label, item.data, saved)
                        }
                        Err(e) => LegacyEntry::Malformed { label, error: e.to_string() },
                    }
                })
                .collect(),
            LegacyPayload::KeyedCache(entries) => entries
                .into_iter()
                .map(|(key, value)| {
                    let label = format!("{source}[{key}]");
                    match serde_json::from_value::<KeyedCacheItem>(value) {
                        Ok(item) => decode(label, item.data, item.saved),
                        Err(e) => LegacyEntry::Malformed { label, error: e.to_string() },
                    }
                })
                .collect(),
            LegacyPayload::SavedList(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, value)| {
                    let label = format!("{source}[{i}]");
                    match serde_json::from_value::<LegacyChordSheet>(value) {
                        Ok(sheet) => decode(label, sheet, true),
                        Err(e) => LegacyEntry::Malformed { label, error: e.to_string() },
                    }
                })
                .collect(),
        }
    }
}

fn decode(label: String, sheet: LegacyChordSheet, saved: bool) -> LegacyEntry {
    match sheet.validate() {
        Ok(chord_sheet) => LegacyEntry::Valid(LegacyItem { chord_sheet, saved }),
        Err(reason) => LegacyEntry::Invalid { label, reason },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_lookup_is_exact() {
        assert_eq!(LegacyKey::from_key("myChordSheets"), Some(LegacyKey::MyChordSheetsCamel));
        assert_eq!(LegacyKey::from_key("mychordsheets"), None);
        assert_eq!(LegacyKey::from_key(MIGRATION_COMPLETED_KEY), None);
        for key in LegacyKey::ALL {
            assert_eq!(LegacyKey::from_key(key.as_str()), Some(key));
        }
    }

    #[test]
    fn test_validate_requires_fields() {
        let ok = LegacyChordSheet {
            title: Some("Hey Jude".into()),
            artist: Some("The Beatles".into()),
            content: Some("[F] [C]".into()),
            ..Default::default()
        };
        let sheet = ok.validate().unwrap();
        assert_eq!(sheet.song_chords, "[F] [C]");
        assert_eq!(sheet.guitar_capo, 0);

        let no_body = LegacyChordSheet { title: Some("a".into()), artist: Some("b".into()), ..Default::default() };
        assert!(no_body.validate().is_err());

        let blank_title = LegacyChordSheet {
            title: Some("  ".into()),
            artist: Some("b".into()),
            song_chords: Some("x".into()),
            ..Default::default()
        };
        assert_eq!(blank_title.validate().unwrap_err(), "missing title");
    }

    #[test]
    fn test_song_chords_preferred_over_content() {
        let sheet = LegacyChordSheet {
            title: Some("a".into()),
            artist: Some("b".into()),
            song_chords: Some("new".into()),
            content: Some("old".into()),
            ..Default::default()
        };
        assert_eq!(sheet.validate().unwrap().song_chords, "new");
    }

    #[test]
    fn test_unified_cache_shape() {
        let raw = json!({
            "items": [
                { "data": { "title": "A", "artist": "X", "songChords": "c" }, "saved": true },
                { "chordSheet": { "title": "B", "artist": "X", "content": "c" }, "metadata": { "saved": false } },
                { "data": { "title": "C" } },
                { "data": 42 }
            ]
        })
        .to_string();

        let entries = LegacyPayload::parse(LegacyKey::UnifiedCache, &raw).unwrap().into_entries(LegacyKey::UnifiedCache);
        assert_eq!(entries.len(), 4);
        assert!(matches!(&entries[0], LegacyEntry::Valid(item) if item.saved));
        assert!(matches!(&entries[1], LegacyEntry::Valid(item) if !item.saved));
        assert!(matches!(&entries[2], LegacyEntry::Invalid { reason, .. } if reason == "missing artist"));
        assert!(
            matches!(&entries[3], LegacyEntry::Malformed { label, .. } if label == "chordium-chord-sheet-cache[3]")
        );
    }

    #[test]
    fn test_keyed_cache_shape() {
        let raw = json!({
            "x_a": { "data": { "title": "A", "artist": "X", "songChords": "c" }, "saved": true },
            "x_b": { "data": { "title": "B", "artist": "X", "songChords": "c" } }
        })
        .to_string();

        let payload = LegacyPayload::parse(LegacyKey::KeyedCache, &raw).unwrap();
        assert_eq!(payload.len(), 2);
        let saved: Vec<bool> = payload
            .into_entries(LegacyKey::KeyedCache)
            .into_iter()
            .map(|entry| match entry {
                LegacyEntry::Valid(item) => item.saved,
                other => panic!("unexpected entry {other:?}"),
            })
            .collect();
        assert_eq!(saved, vec![true, false]);
    }

    #[test]
    fn test_saved_list_shape_marks_saved() {
        let raw = json!([{ "title": "A", "artist": "X", "songChords": "c", "guitarCapo": 3 }]).to_string();
        let entries = LegacyPayload::parse(LegacyKey::MyChordSheets, &raw).unwrap().into_entries(LegacyKey::MyChordSheets);
        match &entries[0] {
            LegacyEntry::Valid(item) => {
                assert!(item.saved);
                assert_eq!(item.chord_sheet.guitar_capo, 3);
            }
            other => panic!("unexpected entry {other:?}"),
        }
    }

    #[test]
    fn test_container_shape_mismatch() {
        assert!(LegacyPayload::parse(LegacyKey::MyChordSheets, "{}").is_err());
        assert!(LegacyPayload::parse(LegacyKey::KeyedCache, "[]").is_err());
        assert!(LegacyPayload::parse(LegacyKey::UnifiedCache, r#"{"entries": []}"#).is_err());
        assert!(LegacyPayload::parse(LegacyKey::UnifiedCache, "not json").is_err());
        assert!(LegacyPayload::parse(LegacyKey::UnifiedCache, r#"{"items": []}"#).unwrap().is_empty());
    }
}
