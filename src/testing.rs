//! Fixture corpora for unit tests.

use serde_json::{json, Value};

use crate::catalog::Catalog;
use crate::models::HymnId;
use crate::store::{MemoryStore, RecordKey};

/// Field-by-field description of one fixture hymn.
#[derive(Clone, Debug, Default)]
pub(crate) struct HymnSpec {
    pub number: u32,
    pub title: String,
    pub author: Option<String>,
    pub composer: Option<String>,
    pub tune: Option<String>,
    pub meter: Option<String>,
    pub themes: Vec<String>,
    pub topics: Vec<String>,
    pub scripture: Vec<String>,
    pub copyright: Option<String>,
    pub verses: Vec<String>,
    pub chorus: Option<String>,
}

impl HymnSpec {
    pub fn new(number: u32, title: impl Into<String>) -> Self {
        Self {
            number,
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn author(mut self, v: &str) -> Self {
        self.author = Some(v.to_string());
        self
    }

    pub fn composer(mut self, v: &str) -> Self {
        self.composer = Some(v.to_string());
        self
    }

    pub fn tune(mut self, v: &str) -> Self {
        self.tune = Some(v.to_string());
        self
    }

    pub fn meter(mut self, v: &str) -> Self {
        self.meter = Some(v.to_string());
        self
    }

    pub fn themes(mut self, v: &[&str]) -> Self {
        self.themes = v.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn topics(mut self, v: &[&str]) -> Self {
        self.topics = v.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn scripture(mut self, v: &[&str]) -> Self {
        self.scripture = v.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn copyright(mut self, v: &str) -> Self {
        self.copyright = Some(v.to_string());
        self
    }

    pub fn verses<S: AsRef<str>>(mut self, v: &[S]) -> Self {
        self.verses = v.iter().map(|s| s.as_ref().to_string()).collect();
        self
    }

    pub fn chorus(mut self, v: &str) -> Self {
        self.chorus = Some(v.to_string());
        self
    }

    fn to_json(&self, id: &str) -> Value {
        let verses: Vec<Value> = self
            .verses
            .iter()
            .enumerate()
            .map(|(i, text)| json!({ "number": i + 1, "text": text }))
            .collect();
        json!({
            "id": id,
            "number": self.number,
            "title": self.title,
            "author": self.author,
            "composer": self.composer,
            "tune": self.tune,
            "meter": self.meter,
            "language": "en",
            "verses": verses,
            "chorus": self.chorus.as_ref().map(|text| json!({ "text": text })),
            "metadata": {
                "copyright": self.copyright,
                "themes": self.themes,
                "topics": self.topics,
                "scripture_references": self.scripture,
            }
        })
    }
}

enum EntryBody {
    Hymn(Value),
    Missing,
    Malformed,
}

struct FixtureHymnal {
    id: String,
    name: String,
    year: i32,
    entries: Vec<(u32, String, EntryBody)>,
}

/// Builds a [`MemoryStore`] holding a reference document, hymnal records and
/// hymn records. Hymnals keep insertion order in the reference document.
#[derive(Default)]
pub(crate) struct CorpusBuilder {
    hymnals: Vec<FixtureHymnal>,
}

impl CorpusBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hymnal(mut self, id: &str, name: &str, year: i32) -> Self {
        self.hymnals.push(FixtureHymnal {
            id: id.to_string(),
            name: name.to_string(),
            year,
            entries: Vec::new(),
        });
        self
    }

    fn push_entry(mut self, hymnal: &str, number: u32, body: impl FnOnce(&str) -> EntryBody) -> Self {
        let target = self
            .hymnals
            .iter_mut()
            .find(|h| h.id == hymnal)
            .expect("fixture hymnal must be declared first");
        let id = HymnId::compose(hymnal, "en", number);
        let body = body(&id);
        target.entries.push((number, id, body));
        self
    }

    pub fn hymn(self, hymnal: &str, spec: HymnSpec) -> Self {
        let number = spec.number;
        self.push_entry(hymnal, number, |id| EntryBody::Hymn(spec.to_json(id)))
    }

    /// Table-of-contents entry with no hymn record behind it.
    pub fn missing_entry(self, hymnal: &str, number: u32) -> Self {
        self.push_entry(hymnal, number, |_| EntryBody::Missing)
    }

    /// Table-of-contents entry whose hymn record does not decode.
    pub fn malformed_entry(self, hymnal: &str, number: u32) -> Self {
        self.push_entry(hymnal, number, |_| EntryBody::Malformed)
    }

    pub fn build(self) -> MemoryStore {
        let mut store = MemoryStore::new();
        // Written by hand: serde_json::Map would sort the hymnal keys.
        let references: Vec<String> = self
            .hymnals
            .iter()
            .map(|h| {
                let reference = json!({
                    "name": h.name,
                    "abbreviation": h.id,
                    "year": h.year,
                    "total_songs": h.entries.len(),
                    "language": "en",
                    "language_name": "English",
                    "compiler": "Fixture Committee",
                });
                format!("{}: {}", Value::String(h.id.clone()), reference)
            })
            .collect();
        store.insert(
            RecordKey::References,
            format!(
                r#"{{"hymnals": {{{}}}, "languages": {{"en": "English"}}}}"#,
                references.join(", ")
            ),
        );

        for hymnal in self.hymnals {
            let entries: Vec<Value> = hymnal
                .entries
                .iter()
                .map(|(number, id, _)| json!({ "number": number, "hymn_id": id }))
                .collect();
            let record = json!({
                "id": hymnal.id,
                "title": hymnal.name,
                "language": "en",
                "year": hymnal.year,
                "hymns": entries,
            });
            store.insert(RecordKey::Hymnal(hymnal.id.clone()), record.to_string());

            for (_, id, body) in hymnal.entries {
                match body {
                    EntryBody::Hymn(value) => store.insert(RecordKey::Hymn(id), value.to_string()),
                    EntryBody::Malformed => store.insert(RecordKey::Hymn(id), "{\"id\": 12"),
                    EntryBody::Missing => {}
                }
            }
        }
        store
    }

    pub fn catalog(self) -> Catalog {
        Catalog::new(self.build())
    }
}

/// Two small hymnals with overlapping tunes, authors and themes.
///
/// SDAH: #1, #42, #100, #108. CH: #5, #12 and a dangling entry #20.
pub(crate) fn sample_corpus() -> CorpusBuilder {
    CorpusBuilder::new()
        .hymnal("SDAH", "Seventh-day Adventist Hymnal", 1985)
        .hymn(
            "SDAH",
            HymnSpec::new(1, "Praise to the Lord")
                .author("J. Neander")
                .composer("Stralsund Gesangbuch")
                .tune("LOBE DEN HERREN")
                .meter("14.14.4.7.8")
                .themes(&["Praise", "Worship"])
                .topics(&["Adoration"])
                .scripture(&["Psalm 103"])
                .verses(&[
                    "Praise to the Lord, the Almighty, the King of creation!",
                    "Praise to the Lord, who o'er all things so wondrously reigneth.",
                ]),
        )
        .hymn(
            "SDAH",
            HymnSpec::new(42, "A Mighty Fortress")
                .author("Martin Luther")
                .composer("Martin Luther")
                .tune("EIN FESTE BURG")
                .meter("8.7.8.7.6.6.6.6.7")
                .themes(&["Trust", "Worship"])
                .verses(&["A mighty fortress is our God, a bulwark never failing."]),
        )
        .hymn(
            "SDAH",
            HymnSpec::new(100, "Great Is Thy Faithfulness")
                .author("Thomas O. Chisholm")
                .composer("William M. Runyan")
                .tune("FAITHFULNESS")
                .meter("11.10.11.10. Ref.")
                .themes(&["Faithfulness", "Praise"])
                .copyright("1923, Ren. 1951 Hope Publishing")
                .verses(&["Great is Thy faithfulness, O God my Father."])
                .chorus("Great is Thy faithfulness! Great is Thy faithfulness!"),
        )
        .hymn(
            "SDAH",
            HymnSpec::new(108, "Amazing Grace")
                .author("J. Newton")
                .tune("AMAZING GRACE")
                .meter("C.M.")
                .themes(&["Grace"])
                .verses(&["Amazing grace! How sweet the sound that saved a wretch like me!"]),
        )
        .hymnal("CH", "Christ in Song", 1908)
        .hymn(
            "CH",
            HymnSpec::new(5, "Amazing Grace")
                .author("J Newton")
                .tune("Amazing Grace")
                .meter("C. M.")
                .themes(&["Grace", "Trust"])
                .verses(&["Amazing grace, how sweet the sound."]),
        )
        .hymn(
            "CH",
            HymnSpec::new(12, "Praise Ye the Lord")
                .author("Anonymous")
                .composer("Stralsund Gesangbuch")
                .tune("LOBE DEN HERREN")
                .themes(&["Praise"])
                .verses(&["Praise ye the Lord, the Almighty."]),
        )
        .missing_entry("CH", 20)
}
