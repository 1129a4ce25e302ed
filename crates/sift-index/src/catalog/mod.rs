//! The system of record consulted by the backend.
//!
//! The backend never owns records. It asks a [`Catalog`] which fields a content
//! type declares, how types relate, and for the records behind the ids a search
//! produced.

mod fixture;
mod memory;

use std::{io, path::PathBuf};

pub use fixture::{load_fixture, parse_fixture};
pub use memory::{MemoryCatalog, MemoryRecord};
use thiserror::Error;

use crate::{
    document::Record,
    fields::{SearchFieldKind, SearchFieldSpec},
    utils::ContentType,
};

/// Errors raised by a record store.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The content type is not registered.
    #[error("unknown content type '{0}'")]
    UnknownContentType(String),

    /// The record store failed.
    #[error("record store error: {0}")]
    Backend(String),

    /// A fixture file could not be read.
    #[error("failed to read fixture {path}: {source}")]
    Read {
        /// Fixture path.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// A fixture file is not valid JSON for the fixture format.
    #[error("failed to parse fixture {path}: {source}")]
    Parse {
        /// Fixture path.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// Fixture content is well-formed JSON but inconsistent.
    #[error("invalid fixture: {0}")]
    Invalid(String),
}

/// A record store with a type hierarchy.
pub trait Catalog: Send + Sync {
    /// Records returned by [`Catalog::fetch_by_ids`].
    type Record: Record + Clone;

    /// The declared search fields of a content type, in declaration order.
    fn search_fields(&self, ct: &ContentType) -> Result<Vec<SearchFieldSpec>, CatalogError>;

    /// Fields searched by autocomplete when the caller names none.
    fn autocomplete_fields(&self, ct: &ContentType) -> Result<Vec<SearchFieldSpec>, CatalogError> {
        Ok(self
            .search_fields(ct)?
            .into_iter()
            .filter(|f| matches!(f.kind, SearchFieldKind::Autocomplete))
            .collect())
    }

    /// Whether `ct` has a segment of its own.
    fn is_indexed(&self, _ct: &ContentType) -> bool {
        true
    }

    /// Indexed ancestor types, nearest first.
    fn ancestors(&self, ct: &ContentType) -> Vec<ContentType>;

    /// Every descendant type.
    fn descendants(&self, ct: &ContentType) -> Vec<ContentType>;

    /// Records of `ct` (or its descendants) whose pk is in `ids`.
    ///
    /// Order is the store's own. Missing ids are simply absent.
    fn fetch_by_ids(
        &self,
        ct: &ContentType,
        ids: &[String],
    ) -> Result<Vec<Self::Record>, CatalogError>;
}
