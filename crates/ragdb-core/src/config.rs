//! Configuration and data directory management.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Error, Result};

/// Default chunk size in tokens of the embedding model's tokenizer.
pub const DEFAULT_CHUNK_SIZE: usize = 512;
/// Default number of nearest chunks fetched from the index.
pub const DEFAULT_K_RETRIEVED: usize = 30;
/// Default number of retrieved chunks kept in the rendered context.
pub const DEFAULT_K_FINAL: usize = 5;
/// Embedding dimension of the bundled model (gte-small / all-MiniLM-L6-v2).
pub const DEFAULT_EMBEDDING_DIM: usize = 384;

/// Paths to all RagDB data directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPaths {
    /// Root data directory (e.g., `data/`).
    pub root: PathBuf,
    /// Vector index + dataset manifest directory (`data/vectordb/`).
    pub vectordb: PathBuf,
    /// Uploaded source files (`data/uploads/`).
    pub uploads: PathBuf,
    /// Embedding model files (`data/models/`).
    pub models: PathBuf,
    /// Bot identity and generation settings (`data/bot-config.json`).
    pub bot_config_file: PathBuf,
}

impl DataPaths {
    /// Create data paths from a root directory. Creates directories if needed.
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        let paths = Self {
            vectordb: root.join("vectordb"),
            uploads: root.join("uploads"),
            models: root.join("models"),
            bot_config_file: root.join("bot-config.json"),
            root,
        };
        paths.ensure_dirs()?;
        Ok(paths)
    }

    fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.vectordb)?;
        std::fs::create_dir_all(&self.uploads)?;
        std::fs::create_dir_all(&self.models)?;
        Ok(())
    }
}

/// Retrieval tuning for the query assembler.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Nearest chunks fetched from the index.
    pub k_retrieved: usize,
    /// Chunks kept in the rendered context.
    pub k_final: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k_retrieved: DEFAULT_K_RETRIEVED,
            k_final: DEFAULT_K_FINAL,
        }
    }
}

/// Top-level RagDB configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    /// HTTP server port.
    pub port: u16,
    /// Data directory paths.
    pub data_paths: DataPaths,
    /// Chunk size in tokens.
    pub chunk_size: usize,
    /// Embedding dimension used when no model file declares one.
    pub embedding_dim: usize,
    /// Retrieval defaults.
    pub retrieval: RetrievalConfig,
}

impl RagConfig {
    /// Create configuration from environment and defaults.
    pub fn from_env(data_dir: impl AsRef<Path>) -> Result<Self> {
        Self::from_lookup(data_dir, |key| std::env::var(key).ok())
    }

    /// Create configuration with variables resolved through `lookup`.
    pub fn from_lookup<F>(data_dir: impl AsRef<Path>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir = data_dir.as_ref();
        if data_dir.as_os_str().is_empty() {
            return Err(Error::Config("data directory path is empty".into()));
        }

        let port = parse_var(&lookup, "PORT", 3003u16)?;
        let chunk_size = parse_var(&lookup, "RAGDB_CHUNK_SIZE", DEFAULT_CHUNK_SIZE)?;
        let embedding_dim = parse_var(&lookup, "RAGDB_EMBEDDING_DIM", DEFAULT_EMBEDDING_DIM)?;
        let retrieval = RetrievalConfig {
            k_retrieved: parse_var(&lookup, "RAGDB_K_RETRIEVED", DEFAULT_K_RETRIEVED)?,
            k_final: parse_var(&lookup, "RAGDB_K_FINAL", DEFAULT_K_FINAL)?,
        };

        if chunk_size < 10 {
            return Err(Error::Config(format!(
                "RAGDB_CHUNK_SIZE must be at least 10, got {}",
                chunk_size
            )));
        }
        if embedding_dim == 0 {
            return Err(Error::Config("RAGDB_EMBEDDING_DIM must be > 0".into()));
        }
        if retrieval.k_final == 0 || retrieval.k_final > retrieval.k_retrieved {
            return Err(Error::Config(format!(
                "RAGDB_K_FINAL must be in 1..={}, got {}",
                retrieval.k_retrieved, retrieval.k_final
            )));
        }

        let data_paths = DataPaths::new(data_dir).map_err(|e| {
            Error::Config(format!(
                "cannot create data directory {}: {}",
                data_dir.display(),
                e
            ))
        })?;

        debug!(
            "Config: port={}, chunk_size={}, embedding_dim={}, k_retrieved={}, k_final={}",
            port, chunk_size, embedding_dim, retrieval.k_retrieved, retrieval.k_final
        );

        Ok(Self {
            port,
            data_paths,
            chunk_size,
            embedding_dim,
            retrieval,
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{} has an invalid value: {:?}", key, raw))),
        None => Ok(default),
    }
}
