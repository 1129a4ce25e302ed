//! Write transactions against segments.

use std::sync::Arc;

use tantivy::{IndexWriter, Term};
use tracing::{debug, info};

use crate::{
    IndexError,
    document::{Document, to_tantivy},
    fields::SearchFieldSpec,
    schema::SegmentSchema,
    store::IndexStore,
    utils::ContentType,
};

/// An open writer on one segment, handed out by [`IndexStore::with_writer`].
///
/// Changes become visible when the enclosing closure returns `Ok`.
pub struct SegmentWriter {
    /// The underlying Tantivy writer.
    writer: IndexWriter,
    /// Schema of the segment being written.
    schema: Arc<SegmentSchema>,
}

impl SegmentWriter {
    /// Wraps an engine writer.
    pub(crate) fn new(writer: IndexWriter, schema: Arc<SegmentSchema>) -> Self {
        Self { writer, schema }
    }

    /// Replaces any document with the same pk.
    pub fn upsert(&mut self, doc: &Document) -> Result<(), IndexError> {
        self.delete(&doc.pk);
        self.writer
            .add_document(to_tantivy(doc, &self.schema))
            .map_err(|e| IndexError::segment(self.schema.content_type.as_str(), &e))?;
        Ok(())
    }

    /// Deletes the document with `pk`.
    pub fn delete(&mut self, pk: &str) {
        self.writer
            .delete_term(Term::from_field_text(self.schema.pk, pk));
    }

    /// Deletes every document in the segment.
    pub fn delete_all(&mut self) -> Result<(), IndexError> {
        self.writer
            .delete_all_documents()
            .map_err(|e| IndexError::segment(self.schema.content_type.as_str(), &e))?;
        Ok(())
    }

    /// Commits pending changes.
    pub(crate) fn commit(&mut self) -> Result<(), IndexError> {
        self.writer
            .commit()
            .map_err(|e| IndexError::segment(self.schema.content_type.as_str(), &e))?;
        Ok(())
    }

    /// Discards pending changes.
    pub(crate) fn rollback(&mut self) -> Result<(), IndexError> {
        self.writer
            .rollback()
            .map_err(|e| IndexError::segment(self.schema.content_type.as_str(), &e))?;
        Ok(())
    }

    /// Merges all searchable segments and removes unused files.
    pub(crate) fn compact(self) -> Result<(), IndexError> {
        let ct = self.schema.content_type.to_string();
        let Self { mut writer, .. } = self;
        let ids = writer
            .index()
            .searchable_segment_ids()
            .map_err(|e| IndexError::segment(&ct, &e))?;
        if ids.len() > 1 {
            writer
                .merge(&ids)
                .wait()
                .map_err(|e| IndexError::segment(&ct, &e))?;
        }
        writer
            .garbage_collect_files()
            .wait()
            .map_err(|e| IndexError::segment(&ct, &e))?;
        writer
            .wait_merging_threads()
            .map_err(|e| IndexError::segment(&ct, &e))?;
        Ok(())
    }
}

/// Batches document writes into one transaction per segment.
#[derive(Debug, Clone)]
pub struct WriteCoordinator {
    /// Segment owner.
    store: Arc<IndexStore>,
    /// Compact after every delete.
    optimize_after_delete: bool,
}

impl WriteCoordinator {
    /// Creates a coordinator over `store`.
    pub fn new(store: Arc<IndexStore>) -> Self {
        let optimize_after_delete = store.config().optimize_after_delete;
        Self {
            store,
            optimize_after_delete,
        }
    }

    /// Upserts a batch in one transaction. Nothing is applied if any document fails.
    pub fn upsert(
        &self,
        ct: &ContentType,
        declared: &[SearchFieldSpec],
        docs: &[Document],
    ) -> Result<(), IndexError> {
        self.store.with_writer(ct, declared, |writer| {
            for doc in docs {
                writer.upsert(doc)?;
            }
            Ok(())
        })?;
        debug!(content_type = %ct, count = docs.len(), "upserted batch");
        Ok(())
    }

    /// Deletes one document, compacting afterwards when configured to.
    pub fn delete(
        &self,
        ct: &ContentType,
        declared: &[SearchFieldSpec],
        pk: &str,
    ) -> Result<(), IndexError> {
        self.store.with_writer(ct, declared, |writer| {
            writer.delete(pk);
            Ok(())
        })?;
        debug!(content_type = %ct, pk, "deleted document");
        if self.optimize_after_delete {
            self.store.compact(ct)?;
        }
        Ok(())
    }

    /// Removes every document of a segment.
    pub fn clear(&self, ct: &ContentType, declared: &[SearchFieldSpec]) -> Result<(), IndexError> {
        self.store
            .with_writer(ct, declared, SegmentWriter::delete_all)?;
        info!(content_type = %ct, "cleared segment");
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use sift_config::Config;

    use super::*;
    use crate::{catalog::MemoryRecord, document::materialize};

    fn setup() -> (Arc<IndexStore>, ContentType, Vec<SearchFieldSpec>) {
        let store = Arc::new(IndexStore::open(&Config::in_memory().backend).unwrap());
        let ct: ContentType = "tests.book".parse().unwrap();
        let declared = vec![SearchFieldSpec::plain_text("title")];
        (store, ct, declared)
    }

    fn doc(ct: &ContentType, declared: &[SearchFieldSpec], pk: &str, title: &str) -> Document {
        materialize(ct, declared, &MemoryRecord::new(pk).with("title", title)).unwrap()
    }

    #[test]
    fn upsert_replaces_by_pk() {
        let (store, ct, declared) = setup();
        let writes = WriteCoordinator::new(Arc::clone(&store));

        writes
            .upsert(&ct, &declared, &[doc(&ct, &declared, "1", "first")])
            .unwrap();
        writes
            .upsert(&ct, &declared, &[doc(&ct, &declared, "1", "second")])
            .unwrap();

        assert_eq!(store.doc_count(&ct, &declared).unwrap(), 1);
    }

    #[test]
    fn failed_batch_applies_nothing() {
        let (store, ct, declared) = setup();
        let good = doc(&ct, &declared, "1", "kept out");
        let result: Result<(), IndexError> = store.with_writer(&ct, &declared, |writer| {
            writer.upsert(&good)?;
            Err(IndexError::InvalidContentType("boom".into()))
        });
        assert!(result.is_err());
        assert_eq!(store.doc_count(&ct, &declared).unwrap(), 0);
    }

    #[test]
    fn delete_and_clear() {
        let (store, ct, declared) = setup();
        let writes = WriteCoordinator::new(Arc::clone(&store));
        writes
            .upsert(
                &ct,
                &declared,
                &[
                    doc(&ct, &declared, "1", "one"),
                    doc(&ct, &declared, "2", "two"),
                ],
            )
            .unwrap();

        writes.delete(&ct, &declared, "1").unwrap();
        assert_eq!(store.doc_count(&ct, &declared).unwrap(), 1);

        writes.clear(&ct, &declared).unwrap();
        assert_eq!(store.doc_count(&ct, &declared).unwrap(), 0);
    }

    #[test]
    fn delete_with_compaction() {
        let mut config = Config::in_memory();
        config.backend.optimize_after_delete = true;
        let store = Arc::new(IndexStore::open(&config.backend).unwrap());
        let ct: ContentType = "tests.book".parse().unwrap();
        let declared = vec![SearchFieldSpec::plain_text("title")];
        let writes = WriteCoordinator::new(Arc::clone(&store));

        writes
            .upsert(&ct, &declared, &[doc(&ct, &declared, "1", "one")])
            .unwrap();
        writes
            .upsert(&ct, &declared, &[doc(&ct, &declared, "2", "two")])
            .unwrap();
        writes.delete(&ct, &declared, "1").unwrap();

        assert_eq!(store.doc_count(&ct, &declared).unwrap(), 1);
    }
}
