//! Core data models for the hymnal catalog.
//!
//! Records are decoded once from the backing store and then shared read-only
//! behind `Arc` by every query component.

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::normalize::slugify;

// ============================================================================
// Hymnal References
// ============================================================================

/// Summary metadata for one hymnal, as listed in the reference catalog.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct HymnalReference {
    /// Filled from the map key when the record omits it.
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub abbreviation: String,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub total_songs: u32,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub language_name: String,
    #[serde(default)]
    pub compiler: Option<String>,
    #[serde(default)]
    pub publisher: Option<String>,
    /// Derived from `name` when absent.
    #[serde(default)]
    pub url_slug: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DateRange {
    #[serde(default)]
    pub earliest: i32,
    #[serde(default)]
    pub latest: i32,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CollectionMetadata {
    #[serde(default)]
    pub total_hymnals: u32,
    #[serde(default)]
    pub date_range: DateRange,
    #[serde(default)]
    pub languages_supported: Vec<String>,
    #[serde(default)]
    pub total_estimated_songs: u32,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub generated_date: String,
}

/// The full reference catalog. `hymnals` keeps the order of the source
/// document, which is the traversal order for every corpus-wide scan.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct HymnalCollection {
    #[serde(default, deserialize_with = "ordered_hymnals")]
    pub hymnals: Vec<Arc<HymnalReference>>,
    #[serde(default)]
    pub languages: BTreeMap<String, String>,
    #[serde(default)]
    pub metadata: CollectionMetadata,
}

impl HymnalCollection {
    pub fn get(&self, id: &str) -> Option<&Arc<HymnalReference>> {
        self.hymnals.iter().find(|h| h.id == id)
    }

    pub fn by_slug(&self, slug: &str) -> Option<&Arc<HymnalReference>> {
        self.hymnals.iter().find(|h| h.url_slug == slug)
    }

    pub fn len(&self) -> usize {
        self.hymnals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hymnals.is_empty()
    }
}

/// Decodes the `{ "ID": {...}, ... }` object into a Vec in document order.
/// Duplicate keys replace the earlier entry in place.
fn ordered_hymnals<'de, D>(deserializer: D) -> Result<Vec<Arc<HymnalReference>>, D::Error>
where
    D: Deserializer<'de>,
{
    struct OrderedHymnals;

    impl<'de> Visitor<'de> for OrderedHymnals {
        type Value = Vec<Arc<HymnalReference>>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a map of hymnal ID to hymnal reference")
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut hymnals: Vec<Arc<HymnalReference>> =
                Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((key, mut reference)) = map.next_entry::<String, HymnalReference>()? {
                if reference.id.is_empty() {
                    reference.id = key;
                }
                if reference.url_slug.trim().is_empty() {
                    reference.url_slug = slugify(&reference.name);
                }
                match hymnals.iter().position(|h| h.id == reference.id) {
                    Some(idx) => hymnals[idx] = Arc::new(reference),
                    None => hymnals.push(Arc::new(reference)),
                }
            }
            Ok(hymnals)
        }
    }

    deserializer.deserialize_map(OrderedHymnals)
}

// ============================================================================
// Hymnals
// ============================================================================

/// One position in a hymnal's table of contents.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HymnalEntry {
    #[serde(default)]
    pub number: u32,
    pub hymn_id: String,
    #[serde(default)]
    pub title: Option<String>,
}

/// One hymnal's ordered table of contents.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Hymnal {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default)]
    pub hymns: Vec<HymnalEntry>,
}

// ============================================================================
// Hymns
// ============================================================================

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Verse {
    pub number: u32,
    pub text: String,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Chorus {
    pub text: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct HymnMetadata {
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub copyright: Option<String>,
    #[serde(default)]
    pub themes: Vec<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub scripture_references: Vec<String>,
    #[serde(default)]
    pub tune_source: Option<String>,
    #[serde(default)]
    pub translator: Option<String>,
    #[serde(default)]
    pub original_language: Option<String>,
}

/// One hymn. Verse order is significant and kept exactly as stored.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Hymn {
    pub id: String,
    pub number: u32,
    pub title: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub composer: Option<String>,
    #[serde(default)]
    pub tune: Option<String>,
    #[serde(default)]
    pub meter: Option<String>,
    #[serde(default)]
    pub language: String,
    #[serde(default, deserialize_with = "verses_any_form")]
    pub verses: Vec<Verse>,
    #[serde(default, deserialize_with = "chorus_any_form")]
    pub chorus: Option<Chorus>,
    #[serde(default, deserialize_with = "metadata_or_default")]
    pub metadata: HymnMetadata,
}

impl Hymn {
    /// All verse text followed by the chorus, space separated.
    pub fn lyrics_text(&self) -> String {
        let mut parts: Vec<&str> = self.verses.iter().map(|v| v.text.as_str()).collect();
        if let Some(chorus) = &self.chorus {
            parts.push(&chorus.text);
        }
        parts.join(" ")
    }

    pub fn slug(&self) -> String {
        format!("hymn-{}-{}", self.number, slugify(&self.title))
    }
}

/// Trimmed value of an optional attribute, `None` when absent or blank.
pub fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawVerse {
    Numbered { number: u32, text: String },
    Bare(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawChorus {
    Object { text: String },
    Bare(String),
}

/// Older records store verses as bare strings; number those by position.
fn verses_any_form<'de, D>(deserializer: D) -> Result<Vec<Verse>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<RawVerse>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(idx, verse)| match verse {
            RawVerse::Numbered { number, text } => Verse { number, text },
            RawVerse::Bare(text) => Verse {
                number: idx as u32 + 1,
                text,
            },
        })
        .collect())
}

fn chorus_any_form<'de, D>(deserializer: D) -> Result<Option<Chorus>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<RawChorus> = Option::deserialize(deserializer)?;
    Ok(raw
        .map(|chorus| match chorus {
            RawChorus::Object { text } | RawChorus::Bare(text) => Chorus { text },
        })
        .filter(|chorus| !chorus.text.trim().is_empty()))
}

fn metadata_or_default<'de, D>(deserializer: D) -> Result<HymnMetadata, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<HymnMetadata>::deserialize(deserializer).map(Option::unwrap_or_default)
}

// ============================================================================
// Compound Hymn IDs
// ============================================================================

/// Parsed form of a compound hymn ID such as `SDAH-en-001`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HymnId {
    pub hymnal: String,
    pub language: String,
    pub number: u32,
}

impl HymnId {
    pub fn compose(hymnal: &str, language: &str, number: u32) -> String {
        format!("{}-{}-{:03}", hymnal, language, number)
    }

    /// Exactly three `-` separated parts with a numeric tail.
    pub fn parse(id: &str) -> Option<HymnId> {
        let mut parts = id.split('-');
        let (hymnal, language, number) = (parts.next()?, parts.next()?, parts.next()?);
        if parts.next().is_some() || hymnal.is_empty() || language.is_empty() {
            return None;
        }
        let number = number.parse().ok()?;
        Some(HymnId {
            hymnal: hymnal.to_string(),
            language: language.to_string(),
            number,
        })
    }
}

impl fmt::Display for HymnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&HymnId::compose(&self.hymnal, &self.language, self.number))
    }
}

// ============================================================================
// Query Results
// ============================================================================

/// A hymn together with the hymnal it was reached through.
#[derive(Clone, Debug, Serialize)]
pub struct CorpusEntry {
    pub hymnal: Arc<HymnalReference>,
    pub hymn: Arc<Hymn>,
}

/// One page of a hymnal listing. `total` and `total_pages` count every entry
/// of the hymnal, resolvable or not.
#[derive(Clone, Debug, Serialize)]
pub struct HymnPage {
    pub hymns: Vec<Arc<Hymn>>,
    pub total: usize,
    pub total_pages: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_keeps_document_order() {
        let json = r#"{
            "hymnals": {
                "SDAH": { "name": "Seventh-day Adventist Hymnal", "abbreviation": "SDAH", "year": 1985, "total_songs": 695, "language": "en", "language_name": "English" },
                "CH": { "name": "Christ in Song", "abbreviation": "CS", "year": 1908, "total_songs": 949, "language": "en", "language_name": "English", "url_slug": "christ-in-song-1908" },
                "BH": { "name": "Brethren Hymnal", "year": 1901 }
            },
            "languages": { "en": "English" }
        }"#;
        let collection: HymnalCollection = serde_json::from_str(json).unwrap();
        let ids: Vec<&str> = collection.hymnals.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["SDAH", "CH", "BH"]);
        assert_eq!(
            collection.get("SDAH").unwrap().url_slug,
            "seventh-day-adventist-hymnal"
        );
        assert_eq!(collection.get("CH").unwrap().url_slug, "christ-in-song-1908");
        assert!(collection.by_slug("brethren-hymnal").is_some());
        assert_eq!(collection.languages.get("en").map(String::as_str), Some("English"));
    }

    #[test]
    fn test_hymn_accepts_both_verse_forms() {
        let object_form = r#"{
            "id": "SDAH-en-001", "number": 1, "title": "Praise to the Lord",
            "verses": [{ "number": 1, "text": "Praise to the Lord" }, { "number": 2, "text": "Praise to the Lord, who o'er all things" }],
            "chorus": { "text": "Amen" },
            "metadata": { "themes": ["Praise"] }
        }"#;
        let hymn: Hymn = serde_json::from_str(object_form).unwrap();
        assert_eq!(hymn.verses.len(), 2);
        assert_eq!(hymn.chorus.as_ref().unwrap().text, "Amen");
        assert_eq!(hymn.metadata.themes, vec!["Praise".to_string()]);

        let bare_form = r#"{
            "id": "CH-en-010", "number": 10, "title": "Old Hymn",
            "verses": ["First verse", "Second verse"],
            "chorus": "Sing on",
            "metadata": null
        }"#;
        let hymn: Hymn = serde_json::from_str(bare_form).unwrap();
        assert_eq!(hymn.verses[1], Verse { number: 2, text: "Second verse".into() });
        assert_eq!(hymn.chorus.unwrap().text, "Sing on");
        assert!(hymn.metadata.themes.is_empty());
    }

    #[test]
    fn test_hymn_id_compose_and_parse() {
        assert_eq!(HymnId::compose("SDAH", "en", 1), "SDAH-en-001");
        assert_eq!(HymnId::compose("SDAH", "en", 1234), "SDAH-en-1234");
        let parsed = HymnId::parse("SDAH-en-042").unwrap();
        assert_eq!(parsed.hymnal, "SDAH");
        assert_eq!(parsed.number, 42);
        assert_eq!(parsed.to_string(), "SDAH-en-042");
        assert!(HymnId::parse("SDAH-042").is_none());
        assert!(HymnId::parse("SDAH-en-x").is_none());
        assert!(HymnId::parse("A-B-en-001").is_none());
    }

    #[test]
    fn test_non_empty_trims() {
        assert_eq!(non_empty(&Some("  J. Newton ".into())), Some("J. Newton"));
        assert_eq!(non_empty(&Some("   ".into())), None);
        assert_eq!(non_empty(&None), None);
    }

    #[test]
    fn test_lyrics_text_and_slug() {
        let hymn = Hymn {
            id: "SDAH-en-100".into(),
            number: 100,
            title: "Great Is Thy Faithfulness!".into(),
            author: None,
            composer: None,
            tune: None,
            meter: None,
            language: "en".into(),
            verses: vec![
                Verse { number: 1, text: "one".into() },
                Verse { number: 2, text: "two".into() },
            ],
            chorus: Some(Chorus { text: "refrain".into() }),
            metadata: HymnMetadata::default(),
        };
        assert_eq!(hymn.lyrics_text(), "one two refrain");
        assert_eq!(hymn.slug(), "hymn-100-great-is-thy-faithfulness");
    }
}
