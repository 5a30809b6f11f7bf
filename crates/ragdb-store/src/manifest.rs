//! Dataset manifest: which sources have been ingested and how large they were.
//!
//! Persisted as a flat JSON object `{ "<source_name>": <size_mb>, ... }` with
//! sorted keys. The runtime holds it next to the index and replaces the file
//! after every successful merge.

use std::collections::BTreeMap;
use std::path::Path;

use ragdb_core::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::persist::atomic_write;

/// File name of the manifest inside the vector store directory.
pub const MANIFEST_FILE: &str = "datasets.json";

/// Convert a byte count to megabytes, rounded to two decimals.
pub fn size_in_mb(size_bytes: u64) -> f64 {
    (size_bytes as f64 / 1e6 * 100.0).round() / 100.0
}

/// Map of ingested source name to its size in megabytes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetManifest {
    entries: BTreeMap<String, f64>,
}

impl DatasetManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, source: &str) -> bool {
        self.entries.contains_key(source)
    }

    pub fn put(&mut self, source: impl Into<String>, size_mb: f64) {
        self.entries.insert(source.into(), size_mb);
    }

    pub fn get(&self, source: &str) -> Option<f64> {
        self.entries.get(source).copied()
    }

    /// All entries, sorted by source name.
    pub fn all(&self) -> &BTreeMap<String, f64> {
        &self.entries
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all recorded sizes.
    pub fn total_mb(&self) -> f64 {
        self.entries.values().sum()
    }

    /// Load from `path`. A missing file yields an empty manifest.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No manifest at {}, starting empty", path.display());
            return Ok(Self::default());
        }
        let raw = std::fs::read(path)?;
        Ok(serde_json::from_slice(&raw)?)
    }

    /// Atomically replace the file at `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        atomic_write(path, &json)
    }
}
