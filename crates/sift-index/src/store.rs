//! Segment storage and the reader/writer discipline around it.
//!
//! Each content type gets its own tantivy index, stored at
//! `{path}/{segment_name}` or in RAM. Writers on one segment are serialized by
//! an in-process mutex (on top of tantivy's directory lock); readers are
//! reloaded explicitly after every commit, so an open searcher keeps the
//! snapshot it started with.

use std::{
    collections::HashMap,
    fmt, fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::{Mutex, MutexGuard, RwLock};
use sift_config::{BackendConfig, ConfigError, StorageKind, WritePolicy};
use tantivy::{
    Index, IndexReader, ReloadPolicy, Searcher, TantivyError, directory::MmapDirectory,
};
use tracing::{debug, info, warn};

use crate::{
    IndexError,
    analyzer::Analyzers,
    fields::SearchFieldSpec,
    schema::{SchemaCache, SegmentSchema},
    utils::ContentType,
    writer::SegmentWriter,
};

/// File written and removed at startup to check the storage root is writable.
const WRITE_PROBE: &str = ".sift-write-test";

/// Largest writer heap tantivy accepts per thread.
const MAX_MEMORY_PER_THREAD: usize = 4_000_000_000;

/// One content type's index.
pub struct Segment {
    /// Schema the segment was opened with.
    schema: Arc<SegmentSchema>,
    /// The Tantivy index.
    index: Index,
    /// Manually reloaded reader.
    reader: IndexReader,
    /// Held for the duration of a write transaction.
    write_lock: Mutex<()>,
}

impl Segment {
    /// The segment's schema.
    pub fn schema(&self) -> &Arc<SegmentSchema> {
        &self.schema
    }

    /// A searcher over the last committed state.
    pub fn searcher(&self) -> Searcher {
        self.reader.searcher()
    }
}

/// Owner of every open segment.
pub struct IndexStore {
    /// Backend settings.
    config: BackendConfig,
    /// Analyzers registered on each segment.
    analyzers: Analyzers,
    /// Storage root; `None` for in-memory storage.
    root: Option<PathBuf>,
    /// Open segments.
    segments: RwLock<HashMap<ContentType, Arc<Segment>>>,
    /// Schemas by content type.
    schemas: SchemaCache,
}

impl fmt::Debug for IndexStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexStore")
            .field("root", &self.root)
            .field("analyzers", &self.analyzers)
            .field("segments", &self.segments.read().keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl IndexStore {
    /// Opens the store, failing on unusable configuration.
    pub fn open(config: &BackendConfig) -> Result<Self, IndexError> {
        config.check()?;
        let analyzers = Analyzers::from_config(config)?;

        let effective = config.effective_memory();
        if effective != config.memory {
            warn!(
                memory = config.memory,
                effective, "writer heap raised to the per-thread minimum"
            );
        }

        let root = match config.storage {
            StorageKind::Memory => None,
            StorageKind::Disk => {
                let path = config.path.clone().ok_or(ConfigError::MissingPath)?;
                probe_writable(&path)?;
                Some(path)
            }
        };

        debug!(root = ?root, analyzer = ?analyzers.kind(), "opened index store");
        Ok(Self {
            config: config.clone(),
            analyzers,
            root,
            segments: RwLock::new(HashMap::new()),
            schemas: SchemaCache::new(),
        })
    }

    /// Backend settings.
    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Registered analyzers.
    pub fn analyzers(&self) -> &Analyzers {
        &self.analyzers
    }

    /// Storage root, if on disk.
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Schema cache.
    pub fn schemas(&self) -> &SchemaCache {
        &self.schemas
    }

    /// Content types with an open segment, sorted.
    pub fn open_segments(&self) -> Vec<ContentType> {
        let mut cts: Vec<_> = self.segments.read().keys().cloned().collect();
        cts.sort();
        cts
    }

    /// Opens or creates the segment for `ct`.
    pub fn ensure_segment(
        &self,
        ct: &ContentType,
        declared: &[SearchFieldSpec],
    ) -> Result<Arc<Segment>, IndexError> {
        if let Some(segment) = self.segments.read().get(ct) {
            return Ok(Arc::clone(segment));
        }

        let schema = self.schemas.get_or_build(ct, declared)?;
        let mut segments = self.segments.write();
        if let Some(segment) = segments.get(ct) {
            return Ok(Arc::clone(segment));
        }

        let index = self.open_index(ct, &schema)?;
        self.analyzers.register(&index);
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .map_err(|e: TantivyError| IndexError::segment(ct.as_str(), &e))?;

        debug!(content_type = %ct, fields = schema.fields().len(), "opened segment");
        let segment = Arc::new(Segment {
            schema,
            index,
            reader,
            write_lock: Mutex::new(()),
        });
        segments.insert(ct.clone(), Arc::clone(&segment));
        Ok(segment)
    }

    /// Opens the engine index backing `ct`.
    fn open_index(&self, ct: &ContentType, schema: &SegmentSchema) -> Result<Index, IndexError> {
        let Some(root) = &self.root else {
            return Ok(Index::create_in_ram(schema.schema().clone()));
        };
        let path = root.join(ct.segment_name());
        fs::create_dir_all(&path)?;
        let dir = MmapDirectory::open(&path).map_err(|e| {
            let err: TantivyError = e.into();
            IndexError::segment(ct.as_str(), &err)
        })?;
        Index::open_or_create(dir, schema.schema().clone())
            .map_err(|e| IndexError::segment(ct.as_str(), &e))
    }

    /// Runs `f` with the segment's single writer.
    ///
    /// Commits and reloads the reader when `f` succeeds; rolls back when it fails.
    pub fn with_writer<T>(
        &self,
        ct: &ContentType,
        declared: &[SearchFieldSpec],
        f: impl FnOnce(&mut SegmentWriter) -> Result<T, IndexError>,
    ) -> Result<T, IndexError> {
        let segment = self.ensure_segment(ct, declared)?;
        let _guard = self.lock_writer(&segment, ct)?;
        let mut writer = self.open_writer(&segment, ct)?;

        match f(&mut writer) {
            Ok(value) => {
                writer.commit()?;
                segment
                    .reader
                    .reload()
                    .map_err(|e| IndexError::segment(ct.as_str(), &e))?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = writer.rollback() {
                    warn!(content_type = %ct, error = %rollback, "rollback failed");
                }
                Err(err)
            }
        }
    }

    /// Runs `f` with a snapshot searcher.
    pub fn with_searcher<T>(
        &self,
        ct: &ContentType,
        declared: &[SearchFieldSpec],
        f: impl FnOnce(&Searcher, &SegmentSchema) -> Result<T, IndexError>,
    ) -> Result<T, IndexError> {
        let segment = self.ensure_segment(ct, declared)?;
        let searcher = segment.searcher();
        f(&searcher, &segment.schema)
    }

    /// Number of live documents in a segment.
    pub fn doc_count(
        &self,
        ct: &ContentType,
        declared: &[SearchFieldSpec],
    ) -> Result<u64, IndexError> {
        self.with_searcher(ct, declared, |searcher, _| Ok(searcher.num_docs()))
    }

    /// Removes a segment and its schema. The next access recreates both.
    pub fn destroy_segment(&self, ct: &ContentType) -> Result<(), IndexError> {
        self.segments.write().remove(ct);
        self.schemas.invalidate(ct);
        if let Some(root) = &self.root {
            remove_dir_if_exists(&root.join(ct.segment_name()))?;
        }
        info!(content_type = %ct, "destroyed segment");
        Ok(())
    }

    /// Empties the storage root and forgets every segment.
    pub fn reset(&self) -> Result<(), IndexError> {
        self.segments.write().clear();
        self.schemas.clear();
        if let Some(root) = &self.root {
            remove_dir_if_exists(root)?;
            probe_writable(root)?;
        }
        info!(root = ?self.root, "reset index storage");
        Ok(())
    }

    /// Reloads a segment's reader so new searchers see the latest commit.
    pub fn refresh(&self, ct: &ContentType) -> Result<(), IndexError> {
        let segment = self.segments.read().get(ct).cloned();
        if let Some(segment) = segment {
            segment
                .reader
                .reload()
                .map_err(|e| IndexError::segment(ct.as_str(), &e))?;
        }
        Ok(())
    }

    /// Merges a segment's files. Searchers keep working meanwhile.
    pub fn compact(&self, ct: &ContentType) -> Result<(), IndexError> {
        let segment = self.segments.read().get(ct).cloned();
        let Some(segment) = segment else {
            return Ok(());
        };
        let _guard = self.lock_writer(&segment, ct)?;
        self.open_writer(&segment, ct)?.compact()?;
        segment
            .reader
            .reload()
            .map_err(|e| IndexError::segment(ct.as_str(), &e))?;
        debug!(content_type = %ct, "compacted segment");
        Ok(())
    }

    /// Acquires the in-process writer lock according to the write policy.
    fn lock_writer<'a>(
        &self,
        segment: &'a Segment,
        ct: &ContentType,
    ) -> Result<MutexGuard<'a, ()>, IndexError> {
        let guard = match (self.config.write_policy, self.config.write_timeout()) {
            (WritePolicy::Fail, _) => segment.write_lock.try_lock(),
            (WritePolicy::Block, Some(timeout)) => segment.write_lock.try_lock_for(timeout),
            (WritePolicy::Block, None) => Some(segment.write_lock.lock()),
        };
        guard.ok_or_else(|| IndexError::WriteConflict {
            content_type: ct.to_string(),
        })
    }

    /// Creates an engine writer sized by the configuration.
    fn open_writer(&self, segment: &Segment, ct: &ContentType) -> Result<SegmentWriter, IndexError> {
        let procs = self.config.procs.max(1);
        let memory = self
            .config
            .effective_memory()
            .min(MAX_MEMORY_PER_THREAD * procs);
        let writer = segment
            .index
            .writer_with_num_threads(procs, memory)
            .map_err(|e| IndexError::segment(ct.as_str(), &e))?;
        Ok(SegmentWriter::new(writer, Arc::clone(&segment.schema)))
    }
}

/// Creates `path` and checks a file can be written in it.
fn probe_writable(path: &Path) -> Result<(), IndexError> {
    let not_writable = |source: io::Error| IndexError::StorageNotWritable {
        path: path.to_path_buf(),
        source,
    };
    fs::create_dir_all(path).map_err(not_writable)?;
    let probe = path.join(WRITE_PROBE);
    fs::write(&probe, b"").map_err(not_writable)?;
    fs::remove_file(&probe).map_err(not_writable)?;
    Ok(())
}

/// Removes a directory tree, ignoring a missing one.
fn remove_dir_if_exists(path: &Path) -> Result<(), IndexError> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod test {
    use std::{thread, time::Duration};

    use sift_config::Config;
    use tempfile::TempDir;

    use super::*;
    use crate::{catalog::MemoryRecord, document::materialize};

    fn ct(label: &str) -> ContentType {
        label.parse().unwrap()
    }

    fn declared() -> Vec<SearchFieldSpec> {
        vec![SearchFieldSpec::plain_text("title")]
    }

    fn add(store: &IndexStore, ct: &ContentType, pk: &str) {
        let doc = materialize(ct, &declared(), &MemoryRecord::new(pk).with("title", "x")).unwrap();
        store
            .with_writer(ct, &declared(), |w| w.upsert(&doc))
            .unwrap();
    }

    #[test]
    fn open_rejects_bad_config() {
        let config = Config::default();
        assert!(matches!(
            IndexStore::open(&config.backend),
            Err(IndexError::Config(_))
        ));

        let mut config = Config::in_memory();
        config.backend.language = "klingon".into();
        assert!(matches!(
            IndexStore::open(&config.backend),
            Err(IndexError::InvalidLanguage(_))
        ));

        let mut config = Config::in_memory();
        config.backend.analyzer = Some("fancy".into());
        assert!(matches!(
            IndexStore::open(&config.backend),
            Err(IndexError::UnknownAnalyzer(_))
        ));
    }

    #[test]
    fn unwritable_root_is_fatal() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("not-a-dir");
        fs::write(&file, "x").unwrap();
        let config = Config::on_disk(file.join("index"));
        assert!(matches!(
            IndexStore::open(&config.backend),
            Err(IndexError::StorageNotWritable { .. })
        ));
    }

    #[test]
    fn segments_are_created_on_disk_and_reopened() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("index");
        let config = Config::on_disk(&root);
        let book = ct("tests.book");

        {
            let store = IndexStore::open(&config.backend).unwrap();
            add(&store, &book, "1");
            assert!(root.join("tests.book").is_dir());
        }

        let store = IndexStore::open(&config.backend).unwrap();
        assert_eq!(store.doc_count(&book, &declared()).unwrap(), 1);
    }

    #[test]
    fn ensure_segment_is_idempotent() {
        let store = IndexStore::open(&Config::in_memory().backend).unwrap();
        let a = store.ensure_segment(&ct("tests.book"), &declared()).unwrap();
        let b = store.ensure_segment(&ct("tests.book"), &declared()).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(store.open_segments(), vec![ct("tests.book")]);
    }

    #[test]
    fn searcher_keeps_its_snapshot() {
        let store = IndexStore::open(&Config::in_memory().backend).unwrap();
        let book = ct("tests.book");
        add(&store, &book, "1");

        let segment = store.ensure_segment(&book, &declared()).unwrap();
        let before = segment.searcher();
        add(&store, &book, "2");

        assert_eq!(before.num_docs(), 1);
        assert_eq!(segment.searcher().num_docs(), 2);
    }

    #[test]
    fn destroy_and_reset() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("index");
        let store = IndexStore::open(&Config::on_disk(&root).backend).unwrap();
        let book = ct("tests.book");
        let author = ct("tests.author");
        add(&store, &book, "1");
        add(&store, &author, "1");

        store.destroy_segment(&book).unwrap();
        assert!(!root.join("tests.book").exists());
        assert!(store.schemas().get(&book).is_none());
        assert_eq!(store.doc_count(&book, &declared()).unwrap(), 0);
        assert_eq!(store.doc_count(&author, &declared()).unwrap(), 1);

        store.reset().unwrap();
        assert!(root.is_dir());
        assert!(store.open_segments().is_empty());
        assert_eq!(store.doc_count(&author, &declared()).unwrap(), 0);
    }

    #[test]
    fn fail_policy_reports_conflict() {
        let mut config = Config::in_memory();
        config.backend.write_policy = WritePolicy::Fail;
        let store = IndexStore::open(&config.backend).unwrap();
        let book = ct("tests.book");

        let result = store.with_writer(&book, &declared(), |_| {
            store.with_writer(&book, &declared(), |_| Ok(()))
        });
        assert!(matches!(result, Err(IndexError::WriteConflict { .. })));
    }

    #[test]
    fn bounded_wait_times_out() {
        let mut config = Config::in_memory();
        config.backend.write_timeout_ms = Some(10);
        let store = IndexStore::open(&config.backend).unwrap();
        let book = ct("tests.book");

        let result = store.with_writer(&book, &declared(), |_| {
            store.with_writer(&book, &declared(), |_| Ok(()))
        });
        assert!(matches!(result, Err(IndexError::WriteConflict { .. })));
    }

    #[test]
    fn blocking_writers_serialize() {
        let store = Arc::new(IndexStore::open(&Config::in_memory().backend).unwrap());
        let book = ct("tests.book");
        store.ensure_segment(&book, &declared()).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let store = Arc::clone(&store);
                let book = book.clone();
                thread::spawn(move || {
                    let doc = materialize(
                        &book,
                        &declared(),
                        &MemoryRecord::new(i.to_string()).with("title", "x"),
                    )
                    .unwrap();
                    store
                        .with_writer(&book, &declared(), |w| {
                            thread::sleep(Duration::from_millis(5));
                            w.upsert(&doc)
                        })
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.doc_count(&book, &declared()).unwrap(), 4);
    }

    #[test]
    fn compaction_keeps_documents() {
        let store = IndexStore::open(&Config::in_memory().backend).unwrap();
        let book = ct("tests.book");
        add(&store, &book, "1");
        add(&store, &book, "2");
        store.compact(&book).unwrap();
        assert_eq!(store.doc_count(&book, &declared()).unwrap(), 2);
    }
}
