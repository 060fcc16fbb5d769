//! Shared normalization functions for entity grouping and URL slugs.
//!
//! The entity key decides which raw spellings of an author, composer, tune,
//! meter or theme land in the same browse group, so any change here changes
//! group membership. Run the aggregate tests after changes.

use any_ascii::any_ascii;
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

// ============================================================================
// REGEX PATTERNS
// ============================================================================

/// Punctuation ignored when comparing names, tunes and meters:
/// commas, periods, whitespace, hyphens, apostrophes.
pub static NAME_PUNCTUATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.,\s\-']+").unwrap());

/// Theme labels additionally ignore ampersands ("Faith & Trust").
pub static THEME_PUNCTUATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.,\s\-'&]+").unwrap());

/// Anything that is not a word character, whitespace or hyphen.
pub static SLUG_INVALID: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9_\s-]").unwrap());

pub static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

pub static DASH_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"-+").unwrap());

// ============================================================================
// PUNCTUATION SETS
// ============================================================================

/// Which characters an entity field strips before comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PunctuationSet {
    Name,
    Theme,
}

impl PunctuationSet {
    fn pattern(self) -> &'static Regex {
        match self {
            PunctuationSet::Name => &NAME_PUNCTUATION,
            PunctuationSet::Theme => &THEME_PUNCTUATION,
        }
    }
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Check if a character is a Unicode combining mark (diacritical mark).
pub fn is_combining_mark(c: char) -> bool {
    matches!(c as u32, 0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x1DC0..=0x1DFF | 0xFE20..=0xFE2F)
}

/// Fold Unicode text to lowercase ASCII by applying NFKD decomposition and
/// removing combining marks, then transliterating what is left.
/// e.g., "Händel" → "handel", "Cantiques Évangéliques" → "cantiques evangeliques"
pub fn fold_to_ascii(s: &str) -> String {
    let stripped: String = s.nfkd().filter(|c| !is_combining_mark(*c)).collect();
    any_ascii(&stripped).to_lowercase()
}

// ============================================================================
// NORMALIZATION FUNCTIONS
// ============================================================================

/// Comparison key for an entity label: strip the field's punctuation set and
/// uppercase the rest. Two raw spellings are the same entity iff their keys
/// are equal. e.g., "J. Newton" and "J Newton" → "JNEWTON"
pub fn entity_key(raw: &str, set: PunctuationSet) -> String {
    set.pattern().replace_all(raw.trim(), "").to_uppercase()
}

/// Browse-page filter: does `label` contain `term` once both are reduced to
/// their entity keys? An empty term matches everything.
pub fn entity_matches(label: &str, term: &str, set: PunctuationSet) -> bool {
    let term_key = entity_key(term, set);
    term_key.is_empty() || entity_key(label, set).contains(&term_key)
}

/// URL slug for a display name.
/// e.g., "Seventh-day Adventist Hymnal" → "seventh-day-adventist-hymnal"
pub fn slugify(name: &str) -> String {
    let folded = fold_to_ascii(name);
    let cleaned = SLUG_INVALID.replace_all(&folded, "");
    let dashed = WHITESPACE_RUN.replace_all(cleaned.trim(), "-");
    DASH_RUN
        .replace_all(&dashed, "-")
        .trim_matches('-')
        .to_string()
}

// ============================================================================
// TESTS
// ============================================================================
