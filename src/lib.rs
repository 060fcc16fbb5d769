//! Hymnal catalog engine: record loading and caching, ranked search, entity
//! browse groups, related-hymn recommendations and printable documents.

pub mod aggregate;
pub mod catalog;
pub mod document;
pub mod error;
pub mod models;
pub mod normalize;
pub mod progress;
pub mod related;
pub mod safety;
pub mod scoring;
pub mod search;
pub mod snapshot;
pub mod store;

#[cfg(test)]
mod testing;

pub use catalog::Catalog;
pub use error::{CatalogError, Result};
