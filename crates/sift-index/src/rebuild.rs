//! Full index rebuilds.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::info;

use crate::{
    IndexError, backend::SearchBackend, catalog::Catalog, document::Record, utils::ContentType,
};

/// One rebuild run.
///
/// The storage root is emptied on the first [`Rebuilder::start`] of the run
/// only, so rebuilding several content types in turn keeps what earlier types
/// already wrote.
#[derive(Debug)]
pub struct Rebuilder<'a, C> {
    /// Backend being rebuilt.
    backend: &'a SearchBackend<C>,
    /// Set once the storage root has been emptied in this run.
    truncated: AtomicBool,
}

impl<'a, C: Catalog> Rebuilder<'a, C> {
    /// Starts a new run.
    pub(crate) fn new(backend: &'a SearchBackend<C>) -> Self {
        Self {
            backend,
            truncated: AtomicBool::new(false),
        }
    }

    /// Prepares `ct` for rebuilding.
    pub fn start(&self, ct: &ContentType) -> Result<(), IndexError> {
        let store = self.backend.store();
        if !self.truncated.swap(true, Ordering::SeqCst) {
            store.reset()?;
            info!(content_type = %ct, "rebuild started, storage emptied");
        } else {
            info!(content_type = %ct, "rebuild started");
        }
        let declared = self.backend.catalog().search_fields(ct)?;
        store.ensure_segment(ct, &declared)?;
        Ok(())
    }

    /// Makes the rebuilt content of `ct` visible to new searchers.
    pub fn finish(&self, ct: &ContentType) -> Result<(), IndexError> {
        self.backend.store().refresh(ct)?;
        info!(content_type = %ct, "rebuild finished");
        Ok(())
    }

    /// Rebuilds `ct` from `records`.
    pub fn rebuild<R: Record>(&self, ct: &ContentType, records: &[R]) -> Result<(), IndexError> {
        self.start(ct)?;
        self.backend.add_bulk(ct, records)?;
        self.finish(ct)
    }

    /// Whether this run has emptied the storage root yet.
    pub fn truncated(&self) -> bool {
        self.truncated.load(Ordering::SeqCst)
    }
}
