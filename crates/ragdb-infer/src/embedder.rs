//! Embedding engine trait.
//!
//! The `Embedder` trait abstracts over embedding generation. Implementations:
//! - `OnnxEmbedder`: ONNX Runtime with a SentenceTransformers model (`onnx` feature)
//! - `HashingEmbedder`: deterministic feature hashing, no model files needed
//! - `CachedEmbedder`: query-cache decorator over any of the above

use ndarray::Array1;
use ragdb_core::{Error, Result, TokenCounter};

/// Trait for embedding backends.
///
/// Returned vectors are L2-normalised, so cosine similarity between two
/// of them is their dot product. The dimension is fixed per instance.
pub trait Embedder: Send + Sync {
    /// Model identifier, persisted with the index to detect mismatches.
    fn model_name(&self) -> &str;

    /// Get the embedding dimension.
    fn dimension(&self) -> usize;

    /// Generate embeddings for a batch of passages.
    fn embed(&self, texts: &[&str]) -> Result<Vec<Array1<f32>>>;

    /// Generate the embedding for a search query.
    fn embed_query(&self, text: &str) -> Result<Array1<f32>> {
        self.embed(&[text])?
            .pop()
            .ok_or_else(|| Error::Inference("embedder returned no vector".into()))
    }

    /// Tokenizer of the underlying model, used to bound chunk sizes.
    fn token_counter(&self) -> &dyn TokenCounter;
}

/// Scale `v` to unit length. Zero vectors are returned unchanged.
pub fn l2_normalize(mut v: Array1<f32>) -> Array1<f32> {
    let norm = v.dot(&v).sqrt();
    if norm > 1e-9 {
        v /= norm;
    }
    v
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_l2_normalize() {
        let v = l2_normalize(array![3.0, 4.0]);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_l2_normalize_zero_vector() {
        let v = l2_normalize(array![0.0, 0.0]);
        assert_eq!(v, array![0.0, 0.0]);
    }
}
