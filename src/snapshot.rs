//! Pack a record store into a single SQLite snapshot file.
//!
//! Every record reachable from the reference document is copied verbatim
//! into `records(key, body)`, keyed by [`RecordKey::cache_key`]. Records that
//! are missing or do not decode are skipped and counted; the snapshot only
//! holds bodies the catalog can read.

use rayon::prelude::*;
use rusqlite::{params, Connection};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};

use crate::error::{CatalogError, Result};
use crate::models::{Hymn, Hymnal, HymnalCollection};
use crate::store::{RecordKey, RecordStore};

pub const WRITE_BATCH_SIZE: usize = 10_000;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SnapshotStats {
    pub hymnals: usize,
    pub hymns: usize,
    pub skipped: usize,
}

/// Raw body of `key` if it exists and decodes as `T`.
fn fetch_valid<T: DeserializeOwned>(store: &dyn RecordStore, key: &RecordKey) -> Option<(String, T)> {
    let bytes = match store.fetch(key) {
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            warn!(key = %key, "record missing, not packed");
            return None;
        }
        Err(e) => {
            warn!(key = %key, error = %e, "record unreadable, not packed");
            return None;
        }
    };
    let decoded = match serde_json::from_slice::<T>(&bytes) {
        Ok(decoded) => decoded,
        Err(e) => {
            warn!(key = %key, error = %e, "record malformed, not packed");
            return None;
        }
    };
    match String::from_utf8(bytes) {
        Ok(body) => Some((body, decoded)),
        Err(e) => {
            warn!(key = %key, error = %e, "record is not UTF-8, not packed");
            None
        }
    }
}

fn write_records(conn: &mut Connection, records: &[(String, String)]) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA temp_store = MEMORY;

        CREATE TABLE records (
            key TEXT PRIMARY KEY,
            body TEXT NOT NULL
        );",
    )?;

    for chunk in records.chunks(WRITE_BATCH_SIZE) {
        let tx = conn.transaction()?;
        {
            let mut stmt =
                tx.prepare_cached("INSERT OR REPLACE INTO records (key, body) VALUES (?1, ?2)")?;
            for (key, body) in chunk {
                stmt.execute(params![key, body])?;
            }
        }
        tx.commit()?;
    }

    // Readers open the snapshot read-only, so leave no WAL behind.
    conn.execute_batch("PRAGMA journal_mode = DELETE; VACUUM; ANALYZE;")?;
    Ok(())
}

/// Copy every reachable record of `store` into a new snapshot at `output`,
/// replacing any existing file. `tick` is called once per hymn entry, from
/// worker threads.
pub fn write_snapshot<F>(store: &dyn RecordStore, output: &Path, tick: F) -> Result<SnapshotStats>
where
    F: Fn() + Sync,
{
    let (references_body, references) =
        fetch_valid::<HymnalCollection>(store, &RecordKey::References)
            .ok_or_else(|| CatalogError::not_found("hymnal references", "references"))?;

    let mut records = vec![(RecordKey::References.cache_key(), references_body)];
    let mut stats = SnapshotStats::default();

    for reference in &references.hymnals {
        let key = RecordKey::Hymnal(reference.id.clone());
        let Some((body, hymnal)) = fetch_valid::<Hymnal>(store, &key) else {
            stats.skipped += 1;
            continue;
        };
        records.push((key.cache_key(), body));
        stats.hymnals += 1;

        let hymns: Vec<Option<(String, String)>> = hymnal
            .hymns
            .par_iter()
            .map(|entry| {
                let key = RecordKey::Hymn(entry.hymn_id.clone());
                let packed = fetch_valid::<Hymn>(store, &key).map(|(body, _)| (key.cache_key(), body));
                tick();
                packed
            })
            .collect();
        for packed in hymns {
            match packed {
                Some(record) => {
                    stats.hymns += 1;
                    records.push(record);
                }
                None => stats.skipped += 1,
            }
        }
    }

    if output.exists() {
        std::fs::remove_file(output)?;
    }
    let mut conn = Connection::open(output)?;
    write_records(&mut conn, &records)?;

    info!(
        output = %output.display(),
        hymnals = stats.hymnals,
        hymns = stats.hymns,
        skipped = stats.skipped,
        "snapshot written"
    );
    Ok(stats)
}
