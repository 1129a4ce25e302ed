//! Tantivy-based search backend for sift.
//!
//! This crate keeps one index segment per content type and handles:
//! - Mapping declared search fields onto index fields and schemas
//! - Flattening records (including related records) into documents
//! - Serialized writes with commit-or-rollback batches
//! - Compiling query expressions per segment, with composed boosts
//! - Searching a type and its descendants and merging scores by primary key
//! - Full rebuilds that empty the storage root once per run
//!
//! # Example
//!
//! ```no_run
//! use sift_config::Config;
//! use sift_index::{
//!     ContentType, MemoryCatalog, MemoryRecord, SearchBackend, SearchFieldSpec, SearchRequest,
//! };
//!
//! let catalog = MemoryCatalog::new();
//! let page: ContentType = "core.page".parse().unwrap();
//! catalog
//!     .register_type(page.clone(), None, true, vec![SearchFieldSpec::plain_text("title")])
//!     .unwrap();
//! let record = MemoryRecord::new("1").with("title", "Learning Python");
//! catalog.insert(&page, record.clone()).unwrap();
//!
//! let backend = SearchBackend::new(&Config::in_memory(), catalog).unwrap();
//! backend.add(&page, &record).unwrap();
//! let hits = backend.search(&SearchRequest::plain(page, "python")).unwrap();
//! assert_eq!(hits.len(), 1);
//! ```

#![warn(missing_docs)]

mod analyzer;
mod backend;
mod catalog;
mod document;
mod error;
mod fields;
mod query;
mod rebuild;
mod schema;
mod search;
mod store;
mod utils;
mod writer;

pub use analyzer::{
    AnalyzerKind, Analyzers, NGRAM_TOKENIZER, RAW_TOKENIZER, TEXT_TOKENIZER, WordNgramTokenizer,
    parse_language,
};
pub use backend::SearchBackend;
pub use catalog::{
    Catalog, CatalogError, MemoryCatalog, MemoryRecord, load_fixture, parse_fixture,
};
pub use document::{Document, FieldValue, Record, materialize, to_tantivy};
pub use error::IndexError;
pub use fields::{
    FieldRole, IndexFieldSpec, MatchKind, RELATED_SEPARATOR, SearchFieldKind, SearchFieldSpec,
    Storage, index_field_name, map_field, related_path,
};
pub use query::{Operator, QueryCompiler, QueryError, QueryExpr, parse as parse_query};
pub use rebuild::Rebuilder;
pub use schema::{
    CONTENT_TYPE_FIELD, FieldSet, MappedField, PK_FIELD, SchemaCache, SegmentSchema, build_schema,
};
pub use search::{Hit, ResultMerger, ScoreMap, SearchMode, SearchRequest, collect_hits};
pub use store::{IndexStore, Segment};
pub use utils::{ContentType, lineage, normalize_boost, search_targets, transliterate};
pub use writer::{SegmentWriter, WriteCoordinator};
