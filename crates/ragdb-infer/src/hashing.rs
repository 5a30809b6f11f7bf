//! Feature-hashing embedder.
//!
//! Maps lowercase word unigrams and character trigrams into a fixed number
//! of signed buckets, then L2-normalises. Texts sharing vocabulary end up
//! with a high cosine similarity, which is enough for lexical retrieval when
//! no neural model is installed. Output is stable across processes and
//! platforms, so a persisted index stays valid between runs.

use ndarray::Array1;
use ragdb_core::{Result, TokenCounter, WordTokenCounter};

use crate::embedder::{l2_normalize, Embedder};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Relative weight of a character trigram against a whole word.
const TRIGRAM_WEIGHT: f32 = 0.5;

/// Deterministic embedder that needs no model files.
pub struct HashingEmbedder {
    dim: usize,
    name: String,
    tokens: WordTokenCounter,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        Self {
            dim: dim.max(1),
            name: format!("feature-hashing-{}", dim.max(1)),
            tokens: WordTokenCounter,
        }
    }

    fn embed_one(&self, text: &str) -> Array1<f32> {
        let mut v = Array1::zeros(self.dim);
        let lowered = text.to_lowercase();
        for word in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            self.add_feature(&mut v, word.as_bytes(), 1.0);

            let padded: Vec<char> = std::iter::once('^')
                .chain(word.chars())
                .chain(std::iter::once('$'))
                .collect();
            for tri in padded.windows(3) {
                let gram: String = tri.iter().collect();
                self.add_feature(&mut v, gram.as_bytes(), TRIGRAM_WEIGHT);
            }
        }
        l2_normalize(v)
    }

    fn add_feature(&self, v: &mut Array1<f32>, feature: &[u8], weight: f32) {
        let h = fnv1a(feature);
        let bucket = (h % self.dim as u64) as usize;
        let sign = if (h >> 63) == 0 { 1.0 } else { -1.0 };
        v[bucket] += sign * weight;
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |h, &b| {
        (h ^ b as u64).wrapping_mul(FNV_PRIME)
    })
}

impl Embedder for HashingEmbedder {
    fn model_name(&self) -> &str {
        &self.name
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    fn embed(&self, texts: &[&str]) -> Result<Vec<Array1<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn token_counter(&self) -> &dyn TokenCounter {
        &self.tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &Array1<f32>, b: &Array1<f32>) -> f32 {
        a.dot(b)
    }

    #[test]
    fn test_unit_length_and_dimension() {
        let e = HashingEmbedder::new(128);
        let v = e.embed_query("The sky is blue.").unwrap();
        assert_eq!(v.len(), 128);
        assert!((v.dot(&v) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_deterministic() {
        let e = HashingEmbedder::new(64);
        let a = e.embed_query("retrieval augmented generation").unwrap();
        let b = e.embed_query("retrieval augmented generation").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_shared_vocabulary_scores_higher() {
        let e = HashingEmbedder::new(384);
        let query = e.embed_query("what color is the sky").unwrap();
        let sky = e.embed_query("The sky is blue.").unwrap();
        let rust = e.embed_query("Tokio schedules futures on worker threads").unwrap();
        assert!(cosine(&query, &sky) > cosine(&query, &rust));
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let e = HashingEmbedder::new(16);
        let v = e.embed_query("").unwrap();
        assert!(v.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_model_name_carries_dimension() {
        assert_eq!(HashingEmbedder::new(32).model_name(), "feature-hashing-32");
    }
}
