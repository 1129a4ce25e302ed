//! The management surface: indexing, deletion, resets and search.

use std::sync::Arc;

use sift_config::{Config, SearchSettings, clamp_fuzzy_distance};
use tracing::{debug, info};

use crate::{
    IndexError,
    catalog::Catalog,
    document::{Record, materialize},
    rebuild::Rebuilder,
    schema::SegmentSchema,
    search::{Hit, ResultMerger, SearchMode, SearchRequest},
    store::IndexStore,
    utils::{ContentType, lineage},
    writer::WriteCoordinator,
};

/// A search backend over a system of record.
///
/// Writes to a content type fan out to each indexed ancestor, so a search on
/// an ancestor finds records of its subtypes.
#[derive(Debug)]
pub struct SearchBackend<C> {
    /// Segment owner.
    store: Arc<IndexStore>,
    /// Batched writes.
    writes: WriteCoordinator,
    /// System of record.
    catalog: C,
    /// Query defaults.
    settings: SearchSettings,
}

impl<C: Catalog> SearchBackend<C> {
    /// Opens the backend. Configuration problems fail here.
    pub fn new(config: &Config, catalog: C) -> Result<Self, IndexError> {
        let store = Arc::new(IndexStore::open(&config.backend)?);
        let writes = WriteCoordinator::new(Arc::clone(&store));
        let mut settings = config.search.clone();
        settings.fuzzy_distance = clamp_fuzzy_distance(settings.fuzzy_distance);
        Ok(Self {
            store,
            writes,
            catalog,
            settings,
        })
    }

    /// The system of record.
    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    /// The segment store.
    pub fn store(&self) -> &Arc<IndexStore> {
        &self.store
    }

    /// Query defaults in effect.
    pub fn settings(&self) -> &SearchSettings {
        &self.settings
    }

    /// The schema of `ct`'s segment.
    pub fn schema(&self, ct: &ContentType) -> Result<Arc<SegmentSchema>, IndexError> {
        let declared = self.catalog.search_fields(ct)?;
        self.store.schemas().get_or_build(ct, &declared)
    }

    /// Indexes one record of type `ct`.
    pub fn add(&self, ct: &ContentType, record: &dyn Record) -> Result<(), IndexError> {
        for target in lineage(&self.catalog, ct) {
            let declared = self.catalog.search_fields(&target)?;
            let doc = materialize(&target, &declared, record)?;
            self.writes.upsert(&target, &declared, &[doc])?;
        }
        Ok(())
    }

    /// Indexes a batch of records of type `ct`, one transaction per segment.
    pub fn add_bulk<R: Record>(&self, ct: &ContentType, records: &[R]) -> Result<(), IndexError> {
        if records.is_empty() {
            return Ok(());
        }
        for target in lineage(&self.catalog, ct) {
            let declared = self.catalog.search_fields(&target)?;
            let docs = records
                .iter()
                .map(|r| materialize(&target, &declared, r))
                .collect::<Result<Vec<_>, _>>()?;
            self.writes.upsert(&target, &declared, &docs)?;
        }
        info!(content_type = %ct, count = records.len(), "indexed records");
        Ok(())
    }

    /// Removes a record of type `ct` from every segment it was written to.
    pub fn delete(&self, ct: &ContentType, record: &dyn Record) -> Result<(), IndexError> {
        self.delete_pk(ct, &record.pk())
    }

    /// Removes the record `pk` of type `ct` from every segment it was written to.
    pub fn delete_pk(&self, ct: &ContentType, pk: &str) -> Result<(), IndexError> {
        for target in lineage(&self.catalog, ct) {
            let declared = self.catalog.search_fields(&target)?;
            self.writes.delete(&target, &declared, pk)?;
        }
        Ok(())
    }

    /// Drops every segment.
    pub fn reset_index(&self) -> Result<(), IndexError> {
        self.store.reset()
    }

    /// Empties the segment of `ct`, leaving every other segment alone.
    ///
    /// Unindexed types have no segment, so clearing one does nothing.
    pub fn clear(&self, ct: &ContentType) -> Result<(), IndexError> {
        let declared = self.catalog.search_fields(ct)?;
        if !self.catalog.is_indexed(ct) {
            debug!(content_type = %ct, "not indexed, nothing to clear");
            return Ok(());
        }
        self.writes.clear(ct, &declared)
    }

    /// Begins a rebuild run.
    pub fn rebuilder(&self) -> Rebuilder<'_, C> {
        Rebuilder::new(self)
    }

    /// Searches `request.content_type` and its descendants.
    pub fn search(&self, request: &SearchRequest) -> Result<Vec<Hit<C::Record>>, IndexError> {
        debug!(
            content_type = %request.content_type,
            query = %request.expr.to_query_string(),
            mode = ?request.mode,
            "search"
        );
        self.merger().search(request)
    }

    /// Searches the autocomplete fields.
    pub fn autocomplete(&self, request: &SearchRequest) -> Result<Vec<Hit<C::Record>>, IndexError> {
        let mut request = request.clone();
        request.mode = SearchMode::Autocomplete;
        self.search(&request)
    }

    /// Number of records `request` matches, ignoring its slice.
    pub fn count(&self, request: &SearchRequest) -> Result<usize, IndexError> {
        self.merger().count(request)
    }

    /// A merger bound to this backend.
    fn merger(&self) -> ResultMerger<'_, C> {
        ResultMerger::new(&self.store, &self.catalog, &self.settings)
    }
}
