//! Runtime types.

use serde::Serialize;

/// Result of a successful ingestion.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub source: String,
    pub documents: usize,
    /// Unique chunks merged into the index.
    pub chunks_added: usize,
    /// Size recorded in the manifest.
    pub size_mb: f64,
    /// Chunks in the index after the merge.
    pub total_chunks: usize,
}

/// Outcome of a wipe. Files are removed independently; failures are listed
/// rather than aborting the wipe.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WipeReport {
    pub removed: Vec<String>,
    pub failed: Vec<String>,
}

impl WipeReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Index and manifest statistics.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub has_index: bool,
    pub sources: usize,
    pub total_mb: f64,
    pub chunks: usize,
    pub embedding_model: String,
    pub embedding_dimension: usize,
    pub chunk_size: usize,
}
