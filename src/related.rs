//! "Related hymns" recommendations.
//!
//! Candidates are visited in corpus traversal order and classified by the
//! first matching relationship: same tune, same composer, same author, then
//! shared theme. The scan stops as soon as `limit` relations are collected,
//! so results follow traversal order, not relevance.

use serde::Serialize;
use std::ops::ControlFlow;
use std::sync::Arc;

use crate::catalog::Catalog;
use crate::error::{CatalogError, Result};
use crate::models::{non_empty, Hymn, HymnalReference};

/// Why a candidate is linked to the source hymn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "theme", rename_all = "snake_case")]
pub enum Relationship {
    SameTune,
    SameComposer,
    SameAuthor,
    SharedTheme(String),
}

impl Relationship {
    /// Display label, e.g. "Same tune" or "Shared theme: Grace".
    pub fn label(&self) -> String {
        match self {
            Relationship::SameTune => "Same tune".to_string(),
            Relationship::SameComposer => "Same composer".to_string(),
            Relationship::SameAuthor => "Same author".to_string(),
            Relationship::SharedTheme(theme) => format!("Shared theme: {}", theme),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Relation {
    pub hymn: Arc<Hymn>,
    pub hymnal: Arc<HymnalReference>,
    pub relationship: Relationship,
    pub label: String,
}

fn same_field(a: &Option<String>, b: &Option<String>) -> bool {
    match (non_empty(a), non_empty(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Strongest relationship between `source` and `candidate`, if any.
pub fn classify(source: &Hymn, candidate: &Hymn) -> Option<Relationship> {
    if same_field(&source.tune, &candidate.tune) {
        return Some(Relationship::SameTune);
    }
    if same_field(&source.composer, &candidate.composer) {
        return Some(Relationship::SameComposer);
    }
    if same_field(&source.author, &candidate.author) {
        return Some(Relationship::SameAuthor);
    }
    source
        .metadata
        .themes
        .iter()
        .find(|theme| candidate.metadata.themes.contains(theme))
        .map(|theme| Relationship::SharedTheme(theme.clone()))
}

/// Up to `limit` hymns related to `hymn_id`.
pub fn related_hymns(catalog: &Catalog, hymn_id: &str, limit: usize) -> Result<Vec<Relation>> {
    if limit == 0 {
        return Err(CatalogError::InvalidQuery(
            "related limit must be positive".to_string(),
        ));
    }
    let source = catalog.hymn(hymn_id)?;

    let mut relations = Vec::with_capacity(limit);
    catalog.visit_corpus(|hymnal, entry, candidate| {
        if entry.hymn_id == source.id || candidate.id == source.id {
            return ControlFlow::Continue(());
        }
        if let Some(relationship) = classify(&source, &candidate) {
            relations.push(Relation {
                label: relationship.label(),
                hymn: candidate,
                hymnal: Arc::clone(hymnal),
                relationship,
            });
            if relations.len() >= limit {
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    });
    Ok(relations)
}
