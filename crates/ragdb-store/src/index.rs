//! In-memory vector index with on-disk persistence.
//!
//! Rows of an `(N, dim)` float32 matrix are L2-normalised at insert time, so
//! a query is one matrix-vector product. Entries are append-only: a merge
//! pushes rows, a failed persist truncates them away again, and only a full
//! wipe removes anything.
//!
//! On disk the index is a pair of files in one directory:
//! - `index.vec`: header (`RAGV`, version, dim, count) + little-endian f32 rows
//! - `index.json`: model name, dimension, metric, and the chunks in row order

use std::collections::BTreeSet;
use std::path::Path;

use ndarray::{concatenate, s, Array1, Array2, Axis};
use ragdb_core::{Error, Result};
use ragdb_infer::Embedder;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::persist::atomic_write;
use crate::types::{Chunk, Distance, ScoredChunk};

/// Binary vector store file name.
pub const INDEX_VEC_FILE: &str = "index.vec";
/// Metadata store file name.
pub const INDEX_META_FILE: &str = "index.json";

const MAGIC: &[u8; 4] = b"RAGV";
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 4 + 4 + 4 + 8;

/// Passages sent to the embedder per call.
const EMBED_BATCH: usize = 64;

#[derive(Serialize, Deserialize)]
struct IndexMeta {
    model: String,
    dim: usize,
    metric: Distance,
    chunks: Vec<Chunk>,
}

/// Nearest-neighbour index over embedded chunks.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    model: String,
    dim: usize,
    metric: Distance,
    matrix: Array2<f32>,
    chunks: Vec<Chunk>,
}

impl VectorIndex {
    /// An index with no entries for the given model identity.
    pub fn empty(model: impl Into<String>, dim: usize, metric: Distance) -> Self {
        Self {
            model: model.into(),
            dim,
            metric,
            matrix: Array2::zeros((0, dim)),
            chunks: Vec::new(),
        }
    }

    /// Embed `chunks` and build a fresh index from them.
    pub fn from_documents(chunks: Vec<Chunk>, embedder: &dyn Embedder, metric: Distance) -> Result<Self> {
        let dim = embedder.dimension();
        let mut matrix = Array2::zeros((chunks.len(), dim));

        for (batch_no, batch) in chunks.chunks(EMBED_BATCH).enumerate() {
            let texts: Vec<&str> = batch.iter().map(|c| c.content.as_str()).collect();
            let vectors = embedder.embed(&texts)?;
            if vectors.len() != batch.len() {
                return Err(Error::Inference(format!(
                    "embedder returned {} vectors for {} passages",
                    vectors.len(),
                    batch.len()
                )));
            }
            for (offset, v) in vectors.iter().enumerate() {
                if v.len() != dim {
                    return Err(Error::Inference(format!(
                        "embedding has {} dimensions, expected {}",
                        v.len(),
                        dim
                    )));
                }
                matrix.row_mut(batch_no * EMBED_BATCH + offset).assign(v);
            }
        }

        // Normalize rows for cosine similarity via dot product
        for mut row in matrix.rows_mut() {
            let norm = row.dot(&row).sqrt();
            if norm > 1e-9 {
                row /= norm;
            }
        }

        debug!("Built index of {} chunks with {}", chunks.len(), embedder.model_name());
        Ok(Self {
            model: embedder.model_name().to_string(),
            dim,
            metric,
            matrix,
            chunks,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn dimension(&self) -> usize {
        self.dim
    }

    pub fn metric(&self) -> Distance {
        self.metric
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Chunks in insertion order.
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Distinct `source` values found in chunk metadata.
    pub fn sources(&self) -> BTreeSet<String> {
        self.chunks
            .iter()
            .filter_map(|c| c.metadata.source.clone())
            .collect()
    }

    fn check_compatible(&self, model: &str, dim: usize, metric: Distance) -> Result<()> {
        if self.model != model || self.dim != dim || self.metric != metric {
            return Err(Error::IncompatibleIndex(format!(
                "index is {}/{}/{}, other is {}/{}/{}",
                self.model, self.dim, self.metric, model, dim, metric
            )));
        }
        Ok(())
    }

    /// Append all entries of `other`. On error `self` is left unchanged.
    pub fn merge(&mut self, other: VectorIndex) -> Result<()> {
        self.check_compatible(&other.model, other.dim, other.metric)?;
        if other.is_empty() {
            return Ok(());
        }

        let matrix = concatenate(Axis(0), &[self.matrix.view(), other.matrix.view()])
            .map_err(|e| Error::Internal(format!("Matrix append failed: {}", e)))?;
        self.matrix = matrix;
        self.chunks.extend(other.chunks);
        Ok(())
    }

    /// Drop every entry past the first `len`. Used to roll back a merge.
    pub fn truncate(&mut self, len: usize) {
        if len >= self.len() {
            return;
        }
        self.matrix = self.matrix.slice(s![..len, ..]).to_owned();
        self.chunks.truncate(len);
    }

    /// Embed `query` and return the `k` nearest chunks.
    pub fn similarity_search(&self, query: &str, k: usize, embedder: &dyn Embedder) -> Result<Vec<ScoredChunk>> {
        self.check_compatible(embedder.model_name(), embedder.dimension(), self.metric)?;
        let q = embedder.embed_query(query)?;
        self.search_by_vector(&q, k)
    }

    /// Return the `k` chunks closest to `query`, nearest first. Equal
    /// distances keep insertion order.
    pub fn search_by_vector(&self, query: &Array1<f32>, k: usize) -> Result<Vec<ScoredChunk>> {
        if query.len() != self.dim {
            return Err(Error::IncompatibleIndex(format!(
                "query has {} dimensions, index has {}",
                query.len(),
                self.dim
            )));
        }
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let q_norm = query.dot(query).sqrt();
        let q = if q_norm > 1e-9 {
            query / q_norm
        } else {
            query.clone()
        };

        // Matrix multiply: (N, dim) @ (dim,) → (N,)
        let similarities = self.matrix.dot(&q);

        let mut indexed: Vec<(usize, f32)> = similarities.iter().copied().enumerate().collect();
        indexed.sort_by(|a, b| b.1.total_cmp(&a.1));
        indexed.truncate(k);

        Ok(indexed
            .into_iter()
            .map(|(i, sim)| ScoredChunk {
                chunk: self.chunks[i].clone(),
                distance: 1.0 - sim,
            })
            .collect())
    }

    /// Whether either index file is present in `dir`.
    pub fn exists(dir: &Path) -> bool {
        dir.join(INDEX_VEC_FILE).exists() || dir.join(INDEX_META_FILE).exists()
    }

    /// Persist to `dir`, replacing each file atomically.
    pub fn save(&self, dir: &Path) -> Result<()> {
        let mut bytes = Vec::with_capacity(HEADER_LEN + self.matrix.len() * 4);
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&(self.dim as u32).to_le_bytes());
        bytes.extend_from_slice(&(self.len() as u64).to_le_bytes());
        for &v in self.matrix.iter() {
            bytes.extend_from_slice(&v.to_le_bytes());
        }

        let meta = IndexMeta {
            model: self.model.clone(),
            dim: self.dim,
            metric: self.metric,
            chunks: self.chunks.clone(),
        };
        let json = serde_json::to_vec(&meta)?;

        atomic_write(&dir.join(INDEX_VEC_FILE), &bytes)?;
        atomic_write(&dir.join(INDEX_META_FILE), &json)?;
        info!("Saved index: {} chunks to {}", self.len(), dir.display());
        Ok(())
    }

    /// Load from `dir`. Returns `None` when neither file exists, or when only
    /// one of the pair is left behind (an interrupted wipe); the leftover
    /// file is removed.
    pub fn load(dir: &Path) -> Result<Option<Self>> {
        let vec_path = dir.join(INDEX_VEC_FILE);
        let meta_path = dir.join(INDEX_META_FILE);

        match (vec_path.exists(), meta_path.exists()) {
            (false, false) => return Ok(None),
            (true, true) => {}
            (has_vec, _) => {
                let leftover = if has_vec { &vec_path } else { &meta_path };
                warn!(
                    "Index in {} is incomplete, discarding leftover {}",
                    dir.display(),
                    leftover.display()
                );
                if let Err(e) = std::fs::remove_file(leftover) {
                    warn!("Could not remove {}: {}", leftover.display(), e);
                }
                return Ok(None);
            }
        }

        let bytes = std::fs::read(&vec_path)?;
        let (dim, count) = parse_header(&bytes)?;
        let body = &bytes[HEADER_LEN..];
        let expected = dim
            .checked_mul(count)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| {
                Error::Storage(format!(
                    "{} header declares an impossible {}x{} matrix",
                    INDEX_VEC_FILE, count, dim
                ))
            })?;
        if body.len() != expected {
            return Err(Error::Storage(format!(
                "{} holds {} bytes of vectors, header declares {}x{}",
                INDEX_VEC_FILE,
                body.len(),
                count,
                dim
            )));
        }
        let values: Vec<f32> = body
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        let matrix = Array2::from_shape_vec((count, dim), values)
            .map_err(|e| Error::Storage(format!("bad vector matrix: {}", e)))?;

        let meta: IndexMeta = serde_json::from_slice(&std::fs::read(&meta_path)?)
            .map_err(|e| Error::Storage(format!("bad {}: {}", INDEX_META_FILE, e)))?;
        if meta.dim != dim || meta.chunks.len() != count {
            return Err(Error::Storage(format!(
                "{} describes {} chunks of dim {}, {} has {} of dim {}",
                INDEX_META_FILE,
                meta.chunks.len(),
                meta.dim,
                INDEX_VEC_FILE,
                count,
                dim
            )));
        }

        info!("Loaded index: {} chunks, model={}", count, meta.model);
        Ok(Some(Self {
            model: meta.model,
            dim,
            metric: meta.metric,
            matrix,
            chunks: meta.chunks,
        }))
    }
}

fn parse_header(bytes: &[u8]) -> Result<(usize, usize)> {
    if bytes.len() < HEADER_LEN || &bytes[..4] != MAGIC {
        return Err(Error::Storage(format!("{} is not a vector file", INDEX_VEC_FILE)));
    }
    let word = |at: usize| u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
    let version = word(4);
    if version != FORMAT_VERSION {
        return Err(Error::Storage(format!(
            "unsupported {} version {}",
            INDEX_VEC_FILE, version
        )));
    }
    let dim = word(8) as usize;
    let mut count = [0u8; 8];
    count.copy_from_slice(&bytes[12..20]);
    Ok((dim, u64::from_le_bytes(count) as usize))
}
