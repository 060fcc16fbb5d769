//! Error taxonomy for catalog lookups, queries and document generation.

pub type Result<T> = std::result::Result<T, CatalogError>;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// The requested record has no resolvable body in the store.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// The record exists but does not decode against the expected shape.
    #[error("malformed record {key}: {source}")]
    MalformedRecord {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("document generation failed: {0}")]
    GenerationFailure(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl CatalogError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        CatalogError::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// True for failures that aggregate scans absorb: the record is simply
    /// left out of the result.
    pub fn is_missing(&self) -> bool {
        matches!(
            self,
            CatalogError::NotFound { .. } | CatalogError::MalformedRecord { .. }
        )
    }
}
