//! RAG index manager.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use ragdb_core::{Error, RagConfig, Result, RetrievalConfig};
use ragdb_infer::Embedder;
use ragdb_ingest::split_documents;
use ragdb_resolve::{AnsweredContext, ContextAssembler, Reranker};
use ragdb_store::{
    size_in_mb, DatasetManifest, Distance, Document, VectorIndex, INDEX_META_FILE, INDEX_VEC_FILE,
    MANIFEST_FILE,
};
use tracing::{debug, error, info, warn};

use crate::types::{IndexStats, IngestReport, WipeReport};

/// Tuning for a [`RagManager`].
#[derive(Debug, Clone, Copy)]
pub struct ManagerOptions {
    pub chunk_size: usize,
    pub retrieval: RetrievalConfig,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            chunk_size: ragdb_core::config::DEFAULT_CHUNK_SIZE,
            retrieval: RetrievalConfig::default(),
        }
    }
}

impl From<&RagConfig> for ManagerOptions {
    fn from(config: &RagConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            retrieval: config.retrieval,
        }
    }
}

struct IndexState {
    index: Option<VectorIndex>,
    manifest: DatasetManifest,
}

/// How a fresh index was folded into the live one.
#[derive(Debug, Clone, Copy)]
enum Merged {
    /// Rows were appended after `previous_len` existing rows.
    Appended { previous_len: usize },
    /// There was no index; the fresh one became the index.
    Adopted,
}

/// Owns the vector index and dataset manifest of one store directory.
pub struct RagManager {
    dir: PathBuf,
    options: ManagerOptions,
    embedder: Arc<dyn Embedder>,
    assembler: ContextAssembler,
    state: RwLock<IndexState>,
    /// Held for the whole of an ingestion or wipe.
    writer: Mutex<()>,
}

impl RagManager {
    /// Open the store in `dir`, loading any persisted index and manifest.
    ///
    /// Without an index the manifest is dropped to empty. Sources present in
    /// the index but missing from the manifest are reported as warnings.
    pub fn open(dir: impl Into<PathBuf>, embedder: Arc<dyn Embedder>, options: ManagerOptions) -> Result<Self> {
        let assembler = ContextAssembler::new(Arc::clone(&embedder));
        Self::open_with_assembler(dir, embedder, assembler, options)
    }

    /// Open with a custom rerank stage.
    pub fn open_with_reranker(
        dir: impl Into<PathBuf>,
        embedder: Arc<dyn Embedder>,
        reranker: Arc<dyn Reranker>,
        options: ManagerOptions,
    ) -> Result<Self> {
        let assembler = ContextAssembler::with_reranker(Arc::clone(&embedder), reranker);
        Self::open_with_assembler(dir, embedder, assembler, options)
    }

    /// Open the store under `config.data_paths.vectordb`.
    pub fn from_config(config: &RagConfig, embedder: Arc<dyn Embedder>) -> Result<Self> {
        Self::open(&config.data_paths.vectordb, embedder, ManagerOptions::from(config))
    }

    fn open_with_assembler(
        dir: impl Into<PathBuf>,
        embedder: Arc<dyn Embedder>,
        assembler: ContextAssembler,
        options: ManagerOptions,
    ) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        let index = VectorIndex::load(&dir)?;
        let manifest_path = dir.join(MANIFEST_FILE);
        let mut manifest = DatasetManifest::load(&manifest_path)?;

        match &index {
            None => {
                if !manifest.is_empty() {
                    warn!(
                        "No index in {}, dropping {} manifest entries",
                        dir.display(),
                        manifest.len()
                    );
                    manifest.clear();
                    manifest.save(&manifest_path)?;
                }
            }
            Some(index) => {
                if index.model() != embedder.model_name() || index.dimension() != embedder.dimension() {
                    warn!(
                        "Index was built with {} (dim {}), current embedder is {} (dim {}); queries will fail until the database is wiped",
                        index.model(),
                        index.dimension(),
                        embedder.model_name(),
                        embedder.dimension()
                    );
                }
                for orphan in index.sources().iter().filter(|s| !manifest.contains(s)) {
                    warn!("Source '{}' is in the index but not in the manifest", orphan);
                }
            }
        }

        info!(
            "Opened store {}: {} chunks, {} sources",
            dir.display(),
            index.as_ref().map_or(0, VectorIndex::len),
            manifest.len()
        );

        Ok(Self {
            dir,
            options,
            embedder,
            assembler,
            state: RwLock::new(IndexState { index, manifest }),
            writer: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    pub fn options(&self) -> &ManagerOptions {
        &self.options
    }

    /// Whether an ingestion or wipe is in flight.
    pub fn is_busy(&self) -> bool {
        self.writer.is_locked()
    }

    /// Chunk, embed and merge `documents` as the new source `source_name`.
    ///
    /// Fails with `DuplicateSource` if the name is already recorded and with
    /// `Busy` while another ingestion or wipe runs. If the index or the
    /// manifest cannot be persisted the merge is rolled back.
    pub fn ingest(&self, source_name: &str, size_bytes: u64, documents: Vec<Document>) -> Result<IngestReport> {
        let _writer = self.writer.try_lock().ok_or(Error::Busy)?;

        if self.state.read().manifest.contains(source_name) {
            return Err(Error::DuplicateSource(source_name.to_string()));
        }

        let documents: Vec<Document> = documents
            .into_iter()
            .map(|doc| {
                if doc.metadata.source.is_some() {
                    doc
                } else {
                    doc.with_source(source_name)
                }
            })
            .collect();

        let chunks = split_documents(&documents, self.options.chunk_size, self.embedder.token_counter());
        let size_mb = size_in_mb(size_bytes);
        info!(
            "Ingesting '{}': {} documents, {} unique chunks",
            source_name,
            documents.len(),
            chunks.len()
        );

        let fresh = if chunks.is_empty() {
            None
        } else {
            Some(VectorIndex::from_documents(chunks, self.embedder.as_ref(), Distance::Cosine)?)
        };
        let chunks_added = fresh.as_ref().map_or(0, VectorIndex::len);

        let mut state = self.state.write();
        let merged = match fresh {
            Some(fresh) => Some(self.merge_and_save(&mut state, fresh)?),
            None => {
                debug!("No chunks for '{}', index unchanged", source_name);
                None
            }
        };

        let mut manifest = state.manifest.clone();
        manifest.put(source_name, size_mb);
        if let Err(e) = manifest.save(&self.dir.join(MANIFEST_FILE)) {
            error!("Failed to persist manifest, rolling back '{}': {}", source_name, e);
            if let Some(merged) = merged {
                self.roll_back(&mut state, merged);
            }
            return Err(e);
        }
        state.manifest = manifest;

        let total_chunks = state.index.as_ref().map_or(0, VectorIndex::len);
        info!(
            "Ingested '{}': +{} chunks ({} total), {} MB",
            source_name, chunks_added, total_chunks, size_mb
        );

        Ok(IngestReport {
            source: source_name.to_string(),
            documents: documents.len(),
            chunks_added,
            size_mb,
            total_chunks,
        })
    }

    /// Merge `fresh` into the live index and persist it. On a failed save
    /// the merge is rolled back before the error is returned.
    fn merge_and_save(&self, state: &mut IndexState, fresh: VectorIndex) -> Result<Merged> {
        let merged = match state.index.as_mut() {
            Some(index) => {
                let len = index.len();
                index.merge(fresh)?;
                Merged::Appended { previous_len: len }
            }
            None => {
                state.index = Some(fresh);
                Merged::Adopted
            }
        };

        let saved = match &state.index {
            Some(index) => index.save(&self.dir),
            None => Ok(()),
        };
        if let Err(e) = saved {
            error!("Failed to persist index, rolling back merge: {}", e);
            self.roll_back(state, merged);
            return Err(e);
        }
        Ok(merged)
    }

    /// Undo a merge in memory and on disk.
    fn roll_back(&self, state: &mut IndexState, merged: Merged) {
        match merged {
            Merged::Appended { previous_len } => {
                if let Some(index) = state.index.as_mut() {
                    index.truncate(previous_len);
                    if let Err(restore) = index.save(&self.dir) {
                        warn!("Could not restore previous index files: {}", restore);
                    }
                }
            }
            Merged::Adopted => {
                state.index = None;
                for file in [INDEX_VEC_FILE, INDEX_META_FILE] {
                    let path = self.dir.join(file);
                    if !path.exists() {
                        continue;
                    }
                    if let Err(e) = std::fs::remove_file(&path) {
                        warn!("Could not remove {} during rollback: {}", path.display(), e);
                    }
                }
            }
        }
    }

    /// Run [`ingest`](Self::ingest) on the blocking pool.
    ///
    /// The work is not cancelled if the returned future is dropped; the index
    /// and manifest still update when it completes.
    pub async fn ingest_in_background(
        self: &Arc<Self>,
        source_name: String,
        size_bytes: u64,
        documents: Vec<Document>,
    ) -> Result<IngestReport> {
        let manager = Arc::clone(self);
        tokio::task::spawn_blocking(move || manager.ingest(&source_name, size_bytes, documents))
            .await
            .map_err(|e| Error::Internal(format!("ingestion worker failed: {}", e)))?
    }

    /// Assemble context for `query`. Before the first ingestion this returns
    /// the empty-database sentinel rather than an error.
    pub fn answer_context(&self, query: &str, k_retrieved: usize, k_final: usize) -> Result<AnsweredContext> {
        let state = self.state.read();
        match self
            .assembler
            .answer_context(state.index.as_ref(), query, k_retrieved, k_final)
        {
            Err(Error::EmptyDatabase) => {
                debug!("Context requested on an empty database");
                Ok(AnsweredContext::empty_database())
            }
            other => other,
        }
    }

    /// [`answer_context`](Self::answer_context) with the configured k values.
    pub fn retrieve(&self, query: &str) -> Result<AnsweredContext> {
        let r = self.options.retrieval;
        self.answer_context(query, r.k_retrieved, r.k_final)
    }

    pub fn is_known_source(&self, source_name: &str) -> bool {
        self.state.read().manifest.contains(source_name)
    }

    /// Manifest entries: source name → size in MB.
    pub fn list_sources(&self) -> BTreeMap<String, f64> {
        self.state.read().manifest.all().clone()
    }

    pub fn stats(&self) -> IndexStats {
        let state = self.state.read();
        IndexStats {
            has_index: state.index.is_some(),
            sources: state.manifest.len(),
            total_mb: state.manifest.total_mb(),
            chunks: state.index.as_ref().map_or(0, VectorIndex::len),
            embedding_model: self.embedder.model_name().to_string(),
            embedding_dimension: self.embedder.dimension(),
            chunk_size: self.options.chunk_size,
        }
    }

    /// Delete the persisted index and manifest and reset in-memory state.
    ///
    /// Each file is removed independently; a failure is logged and listed in
    /// the report, and the remaining files are still attempted.
    pub fn wipe(&self) -> Result<WipeReport> {
        let _writer = self.writer.try_lock().ok_or(Error::Busy)?;
        let mut state = self.state.write();
        let mut report = WipeReport::default();

        for file in [INDEX_META_FILE, INDEX_VEC_FILE, MANIFEST_FILE] {
            let path = self.dir.join(file);
            if !path.exists() {
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => report.removed.push(file.to_string()),
                Err(e) => {
                    error!("Failed to remove {}: {}", path.display(), e);
                    report.failed.push(file.to_string());
                }
            }
        }

        state.index = None;
        state.manifest.clear();
        info!(
            "Wiped store {}: removed {:?}, failed {:?}",
            self.dir.display(),
            report.removed,
            report.failed
        );
        Ok(report)
    }

    /// Run [`wipe`](Self::wipe) on the blocking pool.
    pub async fn wipe_in_background(self: &Arc<Self>) -> Result<WipeReport> {
        let manager = Arc::clone(self);
        tokio::task::spawn_blocking(move || manager.wipe())
            .await
            .map_err(|e| Error::Internal(format!("wipe worker failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragdb_infer::HashingEmbedder;
    use ragdb_resolve::ContextOutcome;
    use std::sync::mpsc;
    use std::time::Duration;

    fn manager(dir: &Path) -> RagManager {
        RagManager::open(dir, Arc::new(HashingEmbedder::new(384)), ManagerOptions::default()).unwrap()
    }

    fn sky() -> Vec<Document> {
        vec![Document::new("The sky is blue.")]
    }

    #[test]
    fn test_end_to_end_sky_is_blue() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(dir.path());

        let report = m.ingest("demo", 1_000_000, sky()).unwrap();
        assert_eq!(report.chunks_added, 1);
        assert_eq!(report.size_mb, 1.0);
        assert_eq!(m.list_sources(), BTreeMap::from([("demo".to_string(), 1.0)]));

        let answered = m.answer_context("what color is the sky", 30, 5).unwrap();
        assert_eq!(answered.outcome, ContextOutcome::Retrieved);
        assert!(answered
            .chunks
            .iter()
            .any(|c| c.chunk.content == "The sky is blue."));
        assert!(answered.context.contains("Document 0:::\nThe sky is blue."));

        let on_disk = DatasetManifest::load(&dir.path().join(MANIFEST_FILE)).unwrap();
        assert_eq!(on_disk.all(), &BTreeMap::from([("demo".to_string(), 1.0)]));
    }

    #[test]
    fn test_empty_database_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(dir.path());
        let answered = m.answer_context("hello", 30, 5).unwrap();
        assert_eq!(answered.outcome, ContextOutcome::EmptyDatabase);
        assert!(answered.chunks.is_empty());
        assert!(!answered.context.is_empty());
    }

    #[test]
    fn test_duplicate_source_rejected_without_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(dir.path());
        m.ingest("demo", 1_000_000, sky()).unwrap();
        let before = m.stats();

        let err = m
            .ingest("demo", 5, vec![Document::new("Grass is green.")])
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateSource(ref s) if s == "demo"));

        let after = m.stats();
        assert_eq!(before.chunks, after.chunks);
        assert_eq!(m.list_sources().get("demo"), Some(&1.0));
    }

    #[test]
    fn test_state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let m = manager(dir.path());
            m.ingest("wikitext", 12_300_000, vec![Document::new("Wiki text about rivers.")])
                .unwrap();
            m.ingest("openassistant", 4_000_000, sky()).unwrap();
        }

        let m = manager(dir.path());
        assert!(m.is_known_source("wikitext"));
        assert_eq!(
            m.list_sources(),
            BTreeMap::from([
                ("openassistant".to_string(), 4.0),
                ("wikitext".to_string(), 12.3)
            ])
        );
        assert_eq!(m.stats().chunks, 2);
        let answered = m.answer_context("sky color", 30, 1).unwrap();
        assert_eq!(answered.chunks[0].chunk.content, "The sky is blue.");
    }

    #[test]
    fn test_wipe_clears_state() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(dir.path());
        m.ingest("demo", 1_000_000, sky()).unwrap();

        let report = m.wipe().unwrap();
        assert!(report.is_clean());
        assert_eq!(report.removed.len(), 3);
        assert!(m.list_sources().is_empty());
        assert!(!VectorIndex::exists(dir.path()));

        let answered = m.answer_context("what color is the sky", 30, 5).unwrap();
        assert_eq!(answered.outcome, ContextOutcome::EmptyDatabase);

        // The name is free again.
        m.ingest("demo", 1_000_000, sky()).unwrap();
    }

    #[test]
    fn test_open_after_interrupted_wipe() {
        let dir = tempfile::tempdir().unwrap();
        {
            let m = manager(dir.path());
            m.ingest("demo", 1_000_000, sky()).unwrap();
        }
        std::fs::remove_file(dir.path().join(INDEX_META_FILE)).unwrap();

        let m = manager(dir.path());
        assert!(!m.stats().has_index);
        assert!(m.list_sources().is_empty());
        assert!(!dir.path().join(INDEX_VEC_FILE).exists());
        m.ingest("demo", 1_000_000, sky()).unwrap();
    }

    #[test]
    fn test_zero_chunks_records_source_only() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(dir.path());
        let report = m.ingest("blank", 10, vec![Document::new("   ")]).unwrap();
        assert_eq!(report.chunks_added, 0);
        assert!(m.is_known_source("blank"));
        assert!(!m.stats().has_index);
        assert!(!VectorIndex::exists(dir.path()));
    }

    #[test]
    fn test_manifest_dropped_when_index_missing() {
        let dir = tempfile::tempdir().unwrap();
        let mut stale = DatasetManifest::new();
        stale.put("ghost", 2.0);
        stale.save(&dir.path().join(MANIFEST_FILE)).unwrap();

        let m = manager(dir.path());
        assert!(m.list_sources().is_empty());
        assert!(DatasetManifest::load(&dir.path().join(MANIFEST_FILE))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_failed_persist_rolls_back_first_index() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("vectordb");
        let m = manager(&store);
        std::fs::remove_dir_all(&store).unwrap();

        assert!(m.ingest("demo", 1_000_000, sky()).is_err());
        assert!(!m.stats().has_index);
        assert!(!m.is_known_source("demo"));

        std::fs::create_dir_all(&store).unwrap();
        m.ingest("demo", 1_000_000, sky()).unwrap();
        assert_eq!(m.stats().chunks, 1);
    }

    #[test]
    fn test_failed_persist_rolls_back_merge() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("vectordb");
        let m = manager(&store);
        m.ingest("demo", 1_000_000, sky()).unwrap();
        std::fs::remove_dir_all(&store).unwrap();

        let err = m.ingest("grass", 10, vec![Document::new("Grass is green.")]);
        assert!(err.is_err());
        assert_eq!(m.stats().chunks, 1);
        assert!(!m.is_known_source("grass"));
        assert!(m.is_known_source("demo"));
    }

    fn block_manifest_writes(store: &Path) {
        std::fs::create_dir_all(store.join(format!("{}.tmp", MANIFEST_FILE))).unwrap();
    }

    #[test]
    fn test_failed_manifest_save_rolls_back_merge() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("vectordb");
        let m = manager(&store);
        m.ingest("base", 10, vec![Document::new("Grass is green."), Document::new("Snow is white.")])
            .unwrap();
        block_manifest_writes(&store);

        assert!(m.ingest("demo", 1_000_000, sky()).is_err());
        assert_eq!(m.stats().chunks, 2);
        assert!(!m.is_known_source("demo"));

        std::fs::remove_dir(store.join(format!("{}.tmp", MANIFEST_FILE))).unwrap();
        m.ingest("demo", 1_000_000, sky()).unwrap();
        assert_eq!(m.stats().chunks, 3);
        drop(m);

        let reopened = manager(&store);
        assert_eq!(reopened.stats().chunks, 3);
        let answered = reopened.answer_context("sky", 30, 30).unwrap();
        let copies = answered
            .chunks
            .iter()
            .filter(|c| c.chunk.content == "The sky is blue.")
            .count();
        assert_eq!(copies, 1);
    }

    #[test]
    fn test_failed_manifest_save_drops_first_index() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("vectordb");
        let m = manager(&store);
        block_manifest_writes(&store);

        assert!(m.ingest("demo", 1_000_000, sky()).is_err());
        assert!(!m.stats().has_index);
        assert!(!store.join(INDEX_VEC_FILE).exists());
        assert!(!store.join(INDEX_META_FILE).exists());
        drop(m);

        std::fs::remove_dir(store.join(format!("{}.tmp", MANIFEST_FILE))).unwrap();
        assert!(!manager(&store).stats().has_index);
    }

    #[test]
    fn test_chunks_tagged_with_source_name() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(dir.path());
        m.ingest(
            "mixed",
            10,
            vec![
                Document::new("Tagged already.").with_source("upstream"),
                Document::new("Not tagged."),
            ],
        )
        .unwrap();

        let answered = m.answer_context("tagged", 30, 5).unwrap();
        let mut sources: Vec<_> = answered
            .chunks
            .iter()
            .filter_map(|c| c.chunk.metadata.source.clone())
            .collect();
        sources.sort();
        assert_eq!(sources, vec!["mixed".to_string(), "upstream".to_string()]);
    }

    /// Blocks inside `embed` until the test releases the gate.
    struct GatedEmbedder {
        inner: HashingEmbedder,
        gate: Arc<Mutex<()>>,
        entered: Mutex<mpsc::Sender<()>>,
    }

    impl Embedder for GatedEmbedder {
        fn model_name(&self) -> &str {
            self.inner.model_name()
        }

        fn dimension(&self) -> usize {
            self.inner.dimension()
        }

        fn embed(&self, texts: &[&str]) -> Result<Vec<ndarray::Array1<f32>>> {
            let _ = self.entered.lock().send(());
            let _open = self.gate.lock();
            self.inner.embed(texts)
        }

        fn token_counter(&self) -> &dyn ragdb_core::TokenCounter {
            self.inner.token_counter()
        }
    }

    #[test]
    fn test_second_writer_is_busy() {
        let dir = tempfile::tempdir().unwrap();
        let gate = Arc::new(Mutex::new(()));
        let (tx, rx) = mpsc::channel();
        let embedder = GatedEmbedder {
            inner: HashingEmbedder::new(64),
            gate: Arc::clone(&gate),
            entered: Mutex::new(tx),
        };
        let m = Arc::new(RagManager::open(dir.path(), Arc::new(embedder), ManagerOptions::default()).unwrap());

        let closed = gate.lock();
        let worker = {
            let m = Arc::clone(&m);
            std::thread::spawn(move || m.ingest("demo", 1_000_000, sky()))
        };
        rx.recv_timeout(Duration::from_secs(10)).unwrap();

        assert!(m.is_busy());
        assert!(matches!(m.ingest("other", 1, sky()), Err(Error::Busy)));
        assert!(matches!(m.wipe(), Err(Error::Busy)));
        // Readers are not blocked by chunking and embedding.
        let answered = m.answer_context("sky", 30, 5).unwrap();
        assert_eq!(answered.outcome, ContextOutcome::EmptyDatabase);

        drop(closed);
        worker.join().unwrap().unwrap();
        assert!(!m.is_busy());
        assert!(m.is_known_source("demo"));
    }

    #[tokio::test]
    async fn test_background_ingest_and_wipe() {
        let dir = tempfile::tempdir().unwrap();
        let m = Arc::new(manager(dir.path()));

        let report = m
            .ingest_in_background("demo".into(), 1_000_000, sky())
            .await
            .unwrap();
        assert_eq!(report.total_chunks, 1);
        assert!(m.is_known_source("demo"));

        let wiped = m.wipe_in_background().await.unwrap();
        assert!(wiped.is_clean());
        assert!(m.list_sources().is_empty());
    }
}
