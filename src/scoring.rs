//! Scoring strategies for free-text hymn search.
//!
//! Two weight tables are in use and both are kept exactly:
//! - corpus-wide relevance: per query term, summed over the terms
//! - per-hymnal weighted: the whole query compared against each field
//!
//! Callers depend on the relative ordering these produce, so the weights are
//! not tunable at runtime.

use std::fmt;
use std::str::FromStr;

use crate::models::{non_empty, Hymn};

// ============================================================================
// Corpus Relevance Weights
// ============================================================================

pub const TERM_IN_TITLE: u32 = 10;
pub const TERM_IN_AUTHOR: u32 = 5;
pub const TERM_IN_COMPOSER: u32 = 5;
pub const TERM_IN_TUNE: u32 = 5;
/// Term anywhere in title, credits, lyrics, themes or topics.
pub const TERM_ANYWHERE: u32 = 1;

// ============================================================================
// Per-Hymnal Weights
// ============================================================================

pub const QUERY_IN_TITLE: u32 = 100;
/// Added on top of `QUERY_IN_TITLE`.
pub const TITLE_PREFIX_BONUS: u32 = 50;
pub const NUMBER_EXACT: u32 = 200;
pub const QUERY_IN_AUTHOR: u32 = 30;
pub const QUERY_IN_COMPOSER: u32 = 30;
pub const QUERY_IN_TUNE: u32 = 20;
/// Counted once per hymn, however many verses match.
pub const QUERY_IN_VERSE: u32 = 10;
pub const QUERY_IN_THEME: u32 = 15;

// ============================================================================
// Strategy Interface
// ============================================================================

/// A scoring policy. `query` arrives trimmed and lowercased; a score of 0
/// means "not a match".
pub trait ScoringStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn score(&self, query: &str, hymn: &Hymn) -> u32;
}

fn contains_lower(field: &Option<String>, needle: &str) -> bool {
    non_empty(field).is_some_and(|v| v.to_lowercase().contains(needle))
}

/// Term-by-term relevance used for corpus-wide search.
#[derive(Debug, Clone, Copy, Default)]
pub struct CorpusRelevance;

impl CorpusRelevance {
    /// Lowercased concatenation of everything a term may match loosely.
    fn searchable_text(hymn: &Hymn) -> String {
        let mut parts: Vec<&str> = vec![
            &hymn.title,
            hymn.author.as_deref().unwrap_or(""),
            hymn.composer.as_deref().unwrap_or(""),
            hymn.tune.as_deref().unwrap_or(""),
        ];
        let lyrics = hymn.lyrics_text();
        parts.push(&lyrics);
        parts.extend(hymn.metadata.themes.iter().map(String::as_str));
        parts.extend(hymn.metadata.topics.iter().map(String::as_str));
        parts.join(" ").to_lowercase()
    }
}

impl ScoringStrategy for CorpusRelevance {
    fn name(&self) -> &'static str {
        "relevance"
    }

    fn score(&self, query: &str, hymn: &Hymn) -> u32 {
        let title = hymn.title.to_lowercase();
        let searchable = Self::searchable_text(hymn);
        let mut score = 0;
        for term in query.split_whitespace() {
            if title.contains(term) {
                score += TERM_IN_TITLE;
            }
            if contains_lower(&hymn.author, term) {
                score += TERM_IN_AUTHOR;
            }
            if contains_lower(&hymn.composer, term) {
                score += TERM_IN_COMPOSER;
            }
            if contains_lower(&hymn.tune, term) {
                score += TERM_IN_TUNE;
            }
            if searchable.contains(term) {
                score += TERM_ANYWHERE;
            }
        }
        score
    }
}

/// Whole-query field weighting used inside a single hymnal.
#[derive(Debug, Clone, Copy, Default)]
pub struct HymnalWeighted;

impl ScoringStrategy for HymnalWeighted {
    fn name(&self) -> &'static str {
        "weighted"
    }

    fn score(&self, query: &str, hymn: &Hymn) -> u32 {
        let mut score = 0;

        let title = hymn.title.to_lowercase();
        if title.contains(query) {
            score += QUERY_IN_TITLE;
            if title.starts_with(query) {
                score += TITLE_PREFIX_BONUS;
            }
        }
        if hymn.number.to_string() == query {
            score += NUMBER_EXACT;
        }
        if contains_lower(&hymn.author, query) {
            score += QUERY_IN_AUTHOR;
        }
        if contains_lower(&hymn.composer, query) {
            score += QUERY_IN_COMPOSER;
        }
        if contains_lower(&hymn.tune, query) {
            score += QUERY_IN_TUNE;
        }
        if hymn
            .verses
            .iter()
            .any(|v| v.text.to_lowercase().contains(query))
        {
            score += QUERY_IN_VERSE;
        }
        if hymn
            .metadata
            .themes
            .iter()
            .any(|t| t.to_lowercase().contains(query))
        {
            score += QUERY_IN_THEME;
        }
        score
    }
}

pub static CORPUS_RELEVANCE: CorpusRelevance = CorpusRelevance;
pub static HYMNAL_WEIGHTED: HymnalWeighted = HymnalWeighted;

// ============================================================================
// Mode Selection
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Relevance,
    Weighted,
}

impl SearchMode {
    /// Default pairing: relevance across the corpus, weighted inside one
    /// hymnal.
    pub fn for_scope(scope: Option<&str>) -> Self {
        match scope {
            Some(_) => SearchMode::Weighted,
            None => SearchMode::Relevance,
        }
    }

    pub fn strategy(self) -> &'static dyn ScoringStrategy {
        match self {
            SearchMode::Relevance => &CORPUS_RELEVANCE,
            SearchMode::Weighted => &HYMNAL_WEIGHTED,
        }
    }
}

impl FromStr for SearchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "relevance" | "corpus" => Ok(SearchMode::Relevance),
            "weighted" | "hymnal" => Ok(SearchMode::Weighted),
            other => Err(format!("unknown search mode '{}'", other)),
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.strategy().name())
    }
}
