//! RagDB Infer: embedding engine, model management, query cache.
//!
//! Provides the `Embedder` trait for generating L2-normalised embeddings.
//! When the `onnx` feature is enabled and model files are present,
//! `OnnxEmbedder` loads a SentenceTransformers model (gte-small,
//! all-MiniLM-L6-v2, ...). Without it, `HashingEmbedder` is used so the
//! index keeps working without any model download.

pub mod cache;
pub mod embedder;
pub mod hashing;
pub mod onnx_embedder;

pub use cache::{CachedEmbedder, QueryCache};
pub use embedder::{l2_normalize, Embedder};
pub use hashing::HashingEmbedder;

#[cfg(feature = "onnx")]
pub use onnx_embedder::OnnxEmbedder;

use std::path::Path;
use std::sync::Arc;

/// Create the best available embedder for the given model directory.
///
/// Tries ONNX first (if feature enabled and model files present), falls
/// back to `HashingEmbedder`. Either way the result serves repeated
/// queries from a `QueryCache`.
pub fn create_embedder(model_dir: &Path, dim: usize) -> Arc<dyn Embedder> {
    #[cfg(feature = "onnx")]
    {
        match OnnxEmbedder::load(model_dir, dim) {
            Ok(embedder) => {
                tracing::info!(
                    "Using ONNX embedder (model={}, dim={})",
                    embedder.model_name(),
                    embedder.dimension()
                );
                return Arc::new(CachedEmbedder::new(Arc::new(embedder)));
            }
            Err(e) => {
                tracing::warn!("ONNX embedder unavailable: {}. Falling back to feature hashing.", e);
            }
        }
    }

    #[cfg(not(feature = "onnx"))]
    {
        let _ = model_dir;
        tracing::info!("ONNX feature disabled. Using feature-hashing embedder.");
    }

    Arc::new(CachedEmbedder::new(Arc::new(HashingEmbedder::new(dim))))
}
