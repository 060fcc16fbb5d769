//! Grouped browse views over entity fields.
//!
//! Raw field values are folded into groups by [`entity_key`]; the first
//! spelling seen in corpus order becomes the group's label. Groups are
//! ordered by descending count, ties in first-seen order.

use rustc_hash::FxHashMap;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::catalog::Catalog;
use crate::error::Result;
use crate::models::{non_empty, CorpusEntry, Hymn};
use crate::normalize::{entity_key, entity_matches, PunctuationSet};

// ============================================================================
// Fields
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityField {
    Author,
    Composer,
    Tune,
    Meter,
    Theme,
}

impl EntityField {
    pub const ALL: [EntityField; 5] = [
        EntityField::Author,
        EntityField::Composer,
        EntityField::Tune,
        EntityField::Meter,
        EntityField::Theme,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityField::Author => "author",
            EntityField::Composer => "composer",
            EntityField::Tune => "tune",
            EntityField::Meter => "meter",
            EntityField::Theme => "theme",
        }
    }

    pub fn punctuation_set(self) -> PunctuationSet {
        match self {
            EntityField::Theme => PunctuationSet::Theme,
            _ => PunctuationSet::Name,
        }
    }

    /// Trimmed non-empty values this hymn contributes. Themes may yield
    /// several; every other field yields at most one.
    pub fn values(self, hymn: &Hymn) -> Vec<&str> {
        let single = match self {
            EntityField::Author => &hymn.author,
            EntityField::Composer => &hymn.composer,
            EntityField::Tune => &hymn.tune,
            EntityField::Meter => &hymn.meter,
            EntityField::Theme => {
                return hymn
                    .metadata
                    .themes
                    .iter()
                    .map(|t| t.trim())
                    .filter(|t| !t.is_empty())
                    .collect();
            }
        };
        non_empty(single).into_iter().collect()
    }

    pub fn key(self, raw: &str) -> String {
        entity_key(raw, self.punctuation_set())
    }
}

impl FromStr for EntityField {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "author" | "authors" => Ok(EntityField::Author),
            "composer" | "composers" => Ok(EntityField::Composer),
            "tune" | "tunes" => Ok(EntityField::Tune),
            "meter" | "meters" | "metre" | "metres" => Ok(EntityField::Meter),
            "theme" | "themes" => Ok(EntityField::Theme),
            other => Err(format!(
                "unknown field '{}' (expected author, composer, tune, meter or theme)",
                other
            )),
        }
    }
}

impl fmt::Display for EntityField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Grouping
// ============================================================================

/// One canonical entity with every hymn that names it.
#[derive(Debug, Clone, Serialize)]
pub struct EntityGroup {
    pub label: String,
    /// Normalized comparison key shared by every spelling in the group.
    pub key: String,
    pub count: usize,
    pub hymns: Vec<CorpusEntry>,
}

/// Group `entries` (in corpus order) by `field`.
pub fn group_entries(entries: &[CorpusEntry], field: EntityField) -> Vec<EntityGroup> {
    let mut groups: Vec<EntityGroup> = Vec::new();
    let mut index: FxHashMap<String, usize> = FxHashMap::default();

    for entry in entries {
        for raw in field.values(&entry.hymn) {
            let key = field.key(raw);
            let slot = *index.entry(key.clone()).or_insert_with(|| {
                groups.push(EntityGroup {
                    label: raw.to_string(),
                    key,
                    count: 0,
                    hymns: Vec::new(),
                });
                groups.len() - 1
            });
            let group = &mut groups[slot];
            group.count += 1;
            group.hymns.push(entry.clone());
        }
    }

    groups.sort_by(|a, b| b.count.cmp(&a.count));
    groups
}

/// Grouped view of `field` across the whole corpus. Unresolvable hymns are
/// absent from the counts.
pub fn aggregate_by_field(catalog: &Catalog, field: EntityField) -> Result<Vec<EntityGroup>> {
    let entries = catalog.corpus(None)?;
    let groups = group_entries(&entries, field);
    tracing::debug!(field = %field, hymns = entries.len(), groups = groups.len(), "aggregated");
    Ok(groups)
}

/// Groups whose normalized label contains the normalized `term`. A blank
/// term keeps everything.
pub fn filter_groups<'a>(
    groups: &'a [EntityGroup],
    field: EntityField,
    term: &str,
) -> Vec<&'a EntityGroup> {
    let set = field.punctuation_set();
    groups
        .iter()
        .filter(|g| entity_matches(&g.label, term, set))
        .collect()
}

/// The group any spelling of `label` belongs to.
pub fn find_group<'a>(
    groups: &'a [EntityGroup],
    field: EntityField,
    label: &str,
) -> Option<&'a EntityGroup> {
    let key = field.key(label);
    groups.iter().find(|g| g.key == key)
}
