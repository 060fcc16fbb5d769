//! Catalog cache and record lookups.
//!
//! [`Catalog`] is the single read path every query component goes through:
//! check the [`CatalogCache`] by stable key, on a miss fetch from the
//! [`RecordStore`], decode, and publish the decoded value. Failures for one
//! key never poison other keys; multi-record scans skip and log them.

use rayon::prelude::*;
use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;
use std::ops::ControlFlow;
use std::sync::{Arc, RwLock};
use tracing::{debug, error, warn};

use crate::error::{CatalogError, Result};
use crate::models::{
    CorpusEntry, Hymn, HymnPage, Hymnal, HymnalCollection, HymnalEntry, HymnalReference,
};
use crate::store::{RecordKey, RecordStore};

// ============================================================================
// Cache
// ============================================================================

/// A decoded record as held by the cache.
#[derive(Clone, Debug)]
pub enum CachedRecord {
    References(Arc<HymnalCollection>),
    Hymnal(Arc<Hymnal>),
    Hymn(Arc<Hymn>),
}

/// Process-lifetime memo of decoded records, keyed by [`RecordKey::cache_key`].
///
/// Two concurrent misses on the same key may both load from the store; the
/// first insert wins and both callers receive that value.
#[derive(Default)]
pub struct CatalogCache {
    entries: RwLock<FxHashMap<String, CachedRecord>>,
}

impl CatalogCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<CachedRecord> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(key).cloned()
    }

    /// Insert unless already present; returns whichever value is cached.
    pub fn insert(&self, key: String, record: CachedRecord) -> CachedRecord {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.entry(key).or_insert(record).clone()
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Record types the cache knows how to hold.
trait Cacheable: DeserializeOwned + Send + Sync + 'static {
    fn wrap(value: Arc<Self>) -> CachedRecord;
    fn downcast(record: &CachedRecord) -> Option<Arc<Self>>;
}

impl Cacheable for HymnalCollection {
    fn wrap(value: Arc<Self>) -> CachedRecord {
        CachedRecord::References(value)
    }

    fn downcast(record: &CachedRecord) -> Option<Arc<Self>> {
        match record {
            CachedRecord::References(v) => Some(Arc::clone(v)),
            _ => None,
        }
    }
}

impl Cacheable for Hymnal {
    fn wrap(value: Arc<Self>) -> CachedRecord {
        CachedRecord::Hymnal(value)
    }

    fn downcast(record: &CachedRecord) -> Option<Arc<Self>> {
        match record {
            CachedRecord::Hymnal(v) => Some(Arc::clone(v)),
            _ => None,
        }
    }
}

impl Cacheable for Hymn {
    fn wrap(value: Arc<Self>) -> CachedRecord {
        CachedRecord::Hymn(value)
    }

    fn downcast(record: &CachedRecord) -> Option<Arc<Self>> {
        match record {
            CachedRecord::Hymn(v) => Some(Arc::clone(v)),
            _ => None,
        }
    }
}

// ============================================================================
// Catalog
// ============================================================================

/// Counts reported by [`Catalog::warm`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct WarmStats {
    pub hymnals: usize,
    pub hymns: usize,
    pub missing: usize,
}

/// Read-only view over one corpus snapshot.
pub struct Catalog {
    store: Box<dyn RecordStore>,
    cache: CatalogCache,
}

impl Catalog {
    pub fn new(store: impl RecordStore + 'static) -> Self {
        Self::from_boxed(Box::new(store))
    }

    pub fn from_boxed(store: Box<dyn RecordStore>) -> Self {
        Self {
            store,
            cache: CatalogCache::new(),
        }
    }

    pub fn cache(&self) -> &CatalogCache {
        &self.cache
    }

    /// Drop every cached record; the next lookups re-read the store.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn describe(&self) -> String {
        self.store.describe()
    }

    /// The backing store, for raw copies that bypass decoding.
    pub fn store(&self) -> &dyn RecordStore {
        self.store.as_ref()
    }

    fn load<T: Cacheable>(&self, key: &RecordKey) -> Result<Arc<T>> {
        let cache_key = key.cache_key();
        if let Some(value) = self.cache.get(&cache_key).as_ref().and_then(T::downcast) {
            return Ok(value);
        }
        debug!(key = %cache_key, "cache miss");

        let bytes = match self.store.fetch(key) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return Err(CatalogError::not_found(key.kind(), key.id())),
            Err(e) => {
                warn!(key = %cache_key, error = %e, "store read failed");
                return Err(CatalogError::not_found(key.kind(), key.id()));
            }
        };

        let decoded: T =
            serde_json::from_slice(&bytes).map_err(|source| CatalogError::MalformedRecord {
                key: cache_key.clone(),
                source,
            })?;

        let cached = self.cache.insert(cache_key, T::wrap(Arc::new(decoded)));
        T::downcast(&cached).ok_or_else(|| CatalogError::Storage(format!("cache type mismatch for {}", key)))
    }

    /// The reference catalog. A missing or malformed reference document
    /// degrades to an empty collection so scans return nothing instead of
    /// failing; the fallback is not cached.
    pub fn references(&self) -> Arc<HymnalCollection> {
        match self.load::<HymnalCollection>(&RecordKey::References) {
            Ok(collection) => collection,
            Err(e) => {
                warn!(error = %e, store = %self.store.describe(), "hymnal references unavailable");
                Arc::new(HymnalCollection::default())
            }
        }
    }

    pub fn hymnal_reference(&self, id: &str) -> Result<Arc<HymnalReference>> {
        self.references()
            .get(id)
            .cloned()
            .ok_or_else(|| CatalogError::not_found("hymnal", id))
    }

    pub fn hymnal_reference_by_slug(&self, slug: &str) -> Result<Arc<HymnalReference>> {
        self.references()
            .by_slug(slug)
            .cloned()
            .ok_or_else(|| CatalogError::not_found("hymnal", slug))
    }

    pub fn hymnal(&self, id: &str) -> Result<Arc<Hymnal>> {
        self.load(&RecordKey::Hymnal(id.to_string()))
    }

    pub fn hymn(&self, id: &str) -> Result<Arc<Hymn>> {
        self.load(&RecordKey::Hymn(id.to_string()))
    }

    /// Resolve one table-of-contents entry, logging and dropping failures.
    fn resolve_entry(&self, hymnal_id: &str, entry: &HymnalEntry) -> Option<Arc<Hymn>> {
        match self.hymn(&entry.hymn_id) {
            Ok(hymn) => Some(hymn),
            Err(e) if e.is_missing() => {
                warn!(hymnal = %hymnal_id, hymn = %entry.hymn_id, error = %e, "skipping unresolvable hymn entry");
                None
            }
            Err(e) => {
                error!(hymnal = %hymnal_id, hymn = %entry.hymn_id, error = %e, "hymn entry failed to load");
                None
            }
        }
    }

    /// Resolve entries in parallel, keeping their order.
    fn resolve_entries(&self, hymnal_id: &str, entries: &[HymnalEntry]) -> Vec<Arc<Hymn>> {
        entries
            .par_iter()
            .filter_map(|entry| self.resolve_entry(hymnal_id, entry))
            .collect()
    }

    /// One page (1-based) of a hymnal's hymns in table-of-contents order.
    ///
    /// Unresolvable entries are dropped from `hymns`, but `total` and
    /// `total_pages` always count the full entry list.
    pub fn hymnal_hymns(&self, hymnal_id: &str, page: usize, page_size: usize) -> Result<HymnPage> {
        if page == 0 || page_size == 0 {
            return Err(CatalogError::InvalidQuery(format!(
                "page and page size must be positive (got page {}, size {})",
                page, page_size
            )));
        }
        let hymnal = self.hymnal(hymnal_id)?;
        let total = hymnal.hymns.len();
        let start = (page - 1).saturating_mul(page_size).min(total);
        let end = start.saturating_add(page_size).min(total);

        Ok(HymnPage {
            hymns: self.resolve_entries(hymnal_id, &hymnal.hymns[start..end]),
            total,
            total_pages: total.div_ceil(page_size),
        })
    }

    /// Every resolvable hymn of one hymnal, paired with its reference.
    /// A missing hymnal record yields an empty list.
    pub fn hymnal_entries(&self, reference: &Arc<HymnalReference>) -> Vec<CorpusEntry> {
        let hymnal = match self.hymnal(&reference.id) {
            Ok(hymnal) => hymnal,
            Err(e) => {
                warn!(hymnal = %reference.id, error = %e, "skipping unresolvable hymnal");
                return Vec::new();
            }
        };
        self.resolve_entries(&reference.id, &hymnal.hymns)
            .into_iter()
            .map(|hymn| CorpusEntry {
                hymnal: Arc::clone(reference),
                hymn,
            })
            .collect()
    }

    /// All resolvable hymns in traversal order: reference order, then table
    /// of contents order. `scope` narrows the scan to one hymnal.
    pub fn corpus(&self, scope: Option<&str>) -> Result<Vec<CorpusEntry>> {
        match scope {
            Some(id) => {
                let reference = self.hymnal_reference(id)?;
                Ok(self.hymnal_entries(&reference))
            }
            None => Ok(self
                .references()
                .hymnals
                .iter()
                .flat_map(|reference| self.hymnal_entries(reference))
                .collect()),
        }
    }

    /// Sequential traversal over the whole corpus that loads lazily and
    /// stops as soon as `visit` breaks.
    pub fn visit_corpus<F>(&self, mut visit: F)
    where
        F: FnMut(&Arc<HymnalReference>, &HymnalEntry, Arc<Hymn>) -> ControlFlow<()>,
    {
        let references = self.references();
        for reference in &references.hymnals {
            let hymnal = match self.hymnal(&reference.id) {
                Ok(hymnal) => hymnal,
                Err(e) => {
                    warn!(hymnal = %reference.id, error = %e, "skipping unresolvable hymnal");
                    continue;
                }
            };
            for entry in &hymnal.hymns {
                let Some(hymn) = self.resolve_entry(&reference.id, entry) else {
                    continue;
                };
                if visit(reference, entry, hymn).is_break() {
                    return;
                }
            }
        }
    }

    /// Number of table-of-contents entries across all resolvable hymnals.
    pub fn entry_count(&self) -> usize {
        self.references()
            .hymnals
            .iter()
            .filter_map(|reference| self.hymnal(&reference.id).ok())
            .map(|hymnal| hymnal.hymns.len())
            .sum()
    }

    /// Load every reachable record into the cache. `tick` is called once per
    /// hymn entry, from worker threads.
    pub fn warm<F>(&self, tick: F) -> WarmStats
    where
        F: Fn() + Sync,
    {
        let references = self.references();
        let mut stats = WarmStats::default();
        for reference in &references.hymnals {
            let Ok(hymnal) = self.hymnal(&reference.id) else {
                warn!(hymnal = %reference.id, "hymnal record unavailable during warm-up");
                continue;
            };
            stats.hymnals += 1;
            let loaded = hymnal
                .hymns
                .par_iter()
                .filter(|entry| {
                    let ok = self.resolve_entry(&reference.id, entry).is_some();
                    tick();
                    ok
                })
                .count();
            stats.hymns += loaded;
            stats.missing += hymnal.hymns.len() - loaded;
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, StoreError};
    use crate::testing::{sample_corpus, CorpusBuilder, HymnSpec};
    use std::io;
    use std::path::PathBuf;

    /// Store whose reads fail with an I/O error for a fixed set of keys.
    struct UnreadableStore {
        inner: MemoryStore,
        unreadable: Vec<RecordKey>,
    }

    impl RecordStore for UnreadableStore {
        fn fetch(&self, key: &RecordKey) -> std::result::Result<Option<Vec<u8>>, StoreError> {
            if self.unreadable.contains(key) {
                return Err(StoreError::Io {
                    path: PathBuf::from(format!("hymns/{}.json", key.id())),
                    source: io::Error::new(io::ErrorKind::PermissionDenied, "permission denied"),
                });
            }
            self.inner.fetch(key)
        }

        fn describe(&self) -> String {
            format!("unreadable {}", self.inner.describe())
        }
    }

    #[test]
    fn test_store_read_failure_reports_not_found() {
        let catalog = Catalog::new(UnreadableStore {
            inner: sample_corpus().build(),
            unreadable: vec![RecordKey::Hymn("SDAH-en-042".into())],
        });

        assert!(matches!(
            catalog.hymn("SDAH-en-042"),
            Err(CatalogError::NotFound { kind: "hymn", .. })
        ));
        assert!(catalog.cache().get("hymn:SDAH-en-042").is_none());

        // The unreadable entry is skipped but still counted.
        let page = catalog.hymnal_hymns("SDAH", 1, 1000).unwrap();
        assert_eq!(page.total, 4);
        let numbers: Vec<u32> = page.hymns.iter().map(|h| h.number).collect();
        assert_eq!(numbers, vec![1, 100, 108]);

        let ids: Vec<String> = catalog
            .corpus(None)
            .unwrap()
            .into_iter()
            .map(|e| e.hymn.id.clone())
            .collect();
        assert_eq!(ids.len(), 5);
        assert!(!ids.iter().any(|id| id == "SDAH-en-042"));
        assert!(catalog.cache().get("hymn:SDAH-en-100").is_some());
    }

    #[test]
    fn test_load_hymn_and_cache() {
        let catalog = sample_corpus().catalog();
        assert!(catalog.cache().is_empty());
        let first = catalog.hymn("SDAH-en-001").unwrap();
        let second = catalog.hymn("SDAH-en-001").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.title, "Praise to the Lord");
        assert_eq!(catalog.cache().len(), 1);

        catalog.clear_cache();
        assert!(catalog.cache().is_empty());
        let reloaded = catalog.hymn("SDAH-en-001").unwrap();
        assert!(!Arc::ptr_eq(&first, &reloaded));
    }

    #[test]
    fn test_missing_and_malformed_records() {
        let catalog = CorpusBuilder::new()
            .hymnal("SDAH", "Seventh-day Adventist Hymnal", 1985)
            .hymn("SDAH", HymnSpec::new(1, "Praise to the Lord"))
            .missing_entry("SDAH", 2)
            .malformed_entry("SDAH", 3)
            .catalog();

        assert!(matches!(
            catalog.hymn("SDAH-en-002"),
            Err(CatalogError::NotFound { kind: "hymn", .. })
        ));
        assert!(matches!(
            catalog.hymn("SDAH-en-003"),
            Err(CatalogError::MalformedRecord { .. })
        ));
        assert!(matches!(
            catalog.hymnal("NOPE"),
            Err(CatalogError::NotFound { kind: "hymnal", .. })
        ));
        // Failures are not cached.
        assert_eq!(catalog.cache().len(), 0);
    }

    #[test]
    fn test_hymnal_hymns_full_listing_in_order() {
        let catalog = sample_corpus().catalog();
        let page = catalog.hymnal_hymns("SDAH", 1, 1000).unwrap();
        assert_eq!(page.total, page.hymns.len());
        assert_eq!(page.total_pages, 1);
        let numbers: Vec<u32> = page.hymns.iter().map(|h| h.number).collect();
        assert_eq!(numbers, vec![1, 42, 100, 108]);
        let mut ids: Vec<&str> = page.hymns.iter().map(|h| h.id.as_str()).collect();
        ids.dedup();
        assert_eq!(ids.len(), page.total);
    }

    #[test]
    fn test_hymnal_hymns_counts_unresolvable_entries() {
        let catalog = sample_corpus().catalog();
        // CH has three entries, one of which has no hymn record.
        let page = catalog.hymnal_hymns("CH", 1, 2).unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.hymns.len(), 2);

        let second = catalog.hymnal_hymns("CH", 2, 2).unwrap();
        assert_eq!(second.total, 3);
        assert_eq!(second.total_pages, 2);
        assert!(second.hymns.is_empty());

        let beyond = catalog.hymnal_hymns("CH", 9, 2).unwrap();
        assert!(beyond.hymns.is_empty());
    }

    #[test]
    fn test_hymnal_hymns_rejects_zero_page() {
        let catalog = sample_corpus().catalog();
        assert!(matches!(
            catalog.hymnal_hymns("SDAH", 0, 10),
            Err(CatalogError::InvalidQuery(_))
        ));
        assert!(matches!(
            catalog.hymnal_hymns("SDAH", 1, 0),
            Err(CatalogError::InvalidQuery(_))
        ));
        assert!(matches!(
            catalog.hymnal_hymns("NOPE", 1, 10),
            Err(CatalogError::NotFound { .. })
        ));
    }

    #[test]
    fn test_missing_references_degrade_to_empty() {
        let catalog = Catalog::new(MemoryStore::new());
        assert!(catalog.references().is_empty());
        assert!(catalog.corpus(None).unwrap().is_empty());
        assert!(matches!(
            catalog.hymnal_reference("SDAH"),
            Err(CatalogError::NotFound { .. })
        ));
    }

    #[test]
    fn test_reference_lookups() {
        let catalog = sample_corpus().catalog();
        let sdah = catalog.hymnal_reference("SDAH").unwrap();
        assert_eq!(sdah.url_slug, "seventh-day-adventist-hymnal");
        let by_slug = catalog.hymnal_reference_by_slug("christ-in-song").unwrap();
        assert_eq!(by_slug.id, "CH");
    }

    #[test]
    fn test_corpus_traversal_order() {
        let catalog = sample_corpus().catalog();
        let ids: Vec<String> = catalog
            .corpus(None)
            .unwrap()
            .into_iter()
            .map(|e| e.hymn.id.clone())
            .collect();
        assert_eq!(
            ids,
            vec![
                "SDAH-en-001",
                "SDAH-en-042",
                "SDAH-en-100",
                "SDAH-en-108",
                "CH-en-005",
                "CH-en-012",
            ]
        );
        let scoped = catalog.corpus(Some("CH")).unwrap();
        assert_eq!(scoped.len(), 2);
        assert!(scoped.iter().all(|e| e.hymnal.id == "CH"));
    }

    #[test]
    fn test_visit_corpus_stops_early() {
        let catalog = sample_corpus().catalog();
        let mut seen = Vec::new();
        catalog.visit_corpus(|_, entry, _| {
            seen.push(entry.hymn_id.clone());
            if seen.len() == 2 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        assert_eq!(seen, vec!["SDAH-en-001", "SDAH-en-042"]);
    }

    #[test]
    fn test_warm_counts() {
        let catalog = sample_corpus().catalog();
        let ticks = std::sync::atomic::AtomicUsize::new(0);
        let stats = catalog.warm(|| {
            ticks.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        });
        assert_eq!(
            stats,
            WarmStats {
                hymnals: 2,
                hymns: 6,
                missing: 1
            }
        );
        assert_eq!(ticks.into_inner(), 7);
        assert_eq!(catalog.entry_count(), 7);
    }

    #[test]
    fn test_concurrent_first_access_shares_value() {
        let catalog = sample_corpus().catalog();
        let loaded: Vec<Arc<Hymn>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| catalog.hymn("SDAH-en-042").unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        let cached = catalog.hymn("SDAH-en-042").unwrap();
        assert!(loaded.iter().all(|h| Arc::ptr_eq(h, &cached)));
    }
}
