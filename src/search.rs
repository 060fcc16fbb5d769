//! Ranked free-text search over the catalog.
//!
//! Every hymn in scope is scored by a [`ScoringStrategy`]; there is no
//! secondary index. Results keep corpus traversal order until the stable
//! descending sort, so equal scores stay in corpus order.

use rayon::prelude::*;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::catalog::Catalog;
use crate::error::{CatalogError, Result};
use crate::models::{Hymn, HymnalReference};
use crate::scoring::{ScoringStrategy, SearchMode};

/// One ranked search result.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub hymn: Arc<Hymn>,
    pub hymnal: Arc<HymnalReference>,
    pub score: u32,
}

/// Search with the default strategy for the scope: corpus relevance across
/// all hymnals, weighted matching inside one.
pub fn search(
    catalog: &Catalog,
    query: &str,
    scope: Option<&str>,
    limit: usize,
) -> Result<Vec<SearchHit>> {
    let strategy = SearchMode::for_scope(scope).strategy();
    search_with(catalog, strategy, query, scope, limit)
}

/// Search with an explicit strategy.
///
/// A blank query yields no results. `limit` must be positive, and a `scope`
/// naming an unknown hymnal is NotFound.
pub fn search_with(
    catalog: &Catalog,
    strategy: &dyn ScoringStrategy,
    query: &str,
    scope: Option<&str>,
    limit: usize,
) -> Result<Vec<SearchHit>> {
    if limit == 0 {
        return Err(CatalogError::InvalidQuery(
            "search limit must be positive".to_string(),
        ));
    }
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return Ok(Vec::new());
    }

    let corpus = catalog.corpus(scope)?;
    let scanned = corpus.len();

    let mut hits: Vec<SearchHit> = corpus
        .into_par_iter()
        .filter_map(|entry| {
            let score = strategy.score(&query, &entry.hymn);
            (score > 0).then(|| SearchHit {
                hymn: entry.hymn,
                hymnal: entry.hymnal,
                score,
            })
        })
        .collect();

    hits.sort_by(|a, b| b.score.cmp(&a.score));
    debug!(
        strategy = strategy.name(),
        query = %query,
        scanned,
        matched = hits.len(),
        "search complete"
    );
    hits.truncate(limit);
    Ok(hits)
}
