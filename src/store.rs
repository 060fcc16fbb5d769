//! Record store adapters.
//!
//! A store hands back the raw JSON body of one record by key, or `None` when
//! the record is absent. Decoding and caching happen one layer up, in
//! [`crate::catalog`].

use rusqlite::{Connection, OpenFlags, OptionalExtension};
use rustc_hash::FxHashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::models::HymnId;

// ============================================================================
// Keys and Errors
// ============================================================================

/// Identifies one record in the backing store.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum RecordKey {
    References,
    Hymnal(String),
    Hymn(String),
}

impl RecordKey {
    /// Stable string used both as the cache key and the snapshot row key.
    pub fn cache_key(&self) -> String {
        match self {
            RecordKey::References => "references".to_string(),
            RecordKey::Hymnal(id) => format!("hymnal:{}", id),
            RecordKey::Hymn(id) => format!("hymn:{}", id),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RecordKey::References => "hymnal references",
            RecordKey::Hymnal(_) => "hymnal",
            RecordKey::Hymn(_) => "hymn",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            RecordKey::References => "references",
            RecordKey::Hymnal(id) | RecordKey::Hymn(id) => id,
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cache_key())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshot error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

// ============================================================================
// Store Trait
// ============================================================================

/// Read-only source of raw record bodies.
pub trait RecordStore: Send + Sync {
    /// Raw body for `key`, `Ok(None)` when the store has no such record.
    fn fetch(&self, key: &RecordKey) -> Result<Option<Vec<u8>>, StoreError>;

    /// Human-readable location for log lines.
    fn describe(&self) -> String;
}

// ============================================================================
// Directory Store
// ============================================================================

/// Processed-data directory layout:
///
/// ```text
/// metadata/hymnals-reference.json
/// hymnals/{hymnal}-collection.json
/// hymns/{hymnal}/{hymn_id}.json
/// ```
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// File backing `key`, `None` for hymn IDs that are not compound IDs.
    pub fn path_for(&self, key: &RecordKey) -> Option<PathBuf> {
        match key {
            RecordKey::References => Some(self.root.join("metadata").join("hymnals-reference.json")),
            RecordKey::Hymnal(id) => Some(
                self.root
                    .join("hymnals")
                    .join(format!("{}-collection.json", id)),
            ),
            RecordKey::Hymn(id) => {
                let parsed = HymnId::parse(id)?;
                Some(
                    self.root
                        .join("hymns")
                        .join(parsed.hymnal)
                        .join(format!("{}.json", id)),
                )
            }
        }
    }
}

impl RecordStore for DirectoryStore {
    fn fetch(&self, key: &RecordKey) -> Result<Option<Vec<u8>>, StoreError> {
        let Some(path) = self.path_for(key) else {
            return Ok(None);
        };
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    fn describe(&self) -> String {
        format!("directory {}", self.root.display())
    }
}

// ============================================================================
// SQLite Snapshot Store
// ============================================================================

/// Read-only SQLite snapshot with a single `records(key, body)` table, as
/// written by [`crate::snapshot::write_snapshot`].
///
/// Each fetch opens its own read-only connection, so concurrent readers never
/// queue behind one another on a shared handle.
pub struct SqliteStore {
    path: PathBuf,
}

impl SqliteStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        // Fail early on a missing or foreign file rather than on first fetch.
        let conn = Self::connect(&path)?;
        conn.query_row("SELECT COUNT(*) FROM records", [], |row| row.get::<_, i64>(0))?;
        Ok(Self { path })
    }

    fn connect(path: &Path) -> Result<Connection, StoreError> {
        Ok(Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?)
    }
}

impl RecordStore for SqliteStore {
    fn fetch(&self, key: &RecordKey) -> Result<Option<Vec<u8>>, StoreError> {
        let conn = Self::connect(&self.path)?;
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM records WHERE key = ?1",
                [key.cache_key()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(body.map(String::into_bytes))
    }

    fn describe(&self) -> String {
        format!("snapshot {}", self.path.display())
    }
}

// ============================================================================
// Memory Store
// ============================================================================

/// Map-backed store for tests and embedding callers that already hold the
/// corpus in memory.
#[derive(Default)]
pub struct MemoryStore {
    records: FxHashMap<RecordKey, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: RecordKey, body: impl Into<Vec<u8>>) {
        self.records.insert(key, body.into());
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl RecordStore for MemoryStore {
    fn fetch(&self, key: &RecordKey) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.records.get(key).cloned())
    }

    fn describe(&self) -> String {
        format!("memory ({} records)", self.records.len())
    }
}
