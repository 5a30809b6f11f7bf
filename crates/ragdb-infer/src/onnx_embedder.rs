//! ONNX-based embedding engine.
//!
//! Loads a SentenceTransformers ONNX model (gte-small, all-MiniLM-L6-v2)
//! and its HuggingFace tokenizer to generate float32 embeddings. The same
//! tokenizer backs the chunker's token budget. Requires the `onnx` feature.

#[cfg(feature = "onnx")]
mod inner {
    use std::path::Path;
    use std::sync::Arc;

    use ndarray::Array1;
    use ort::session::Session;
    use ort::value::Tensor;
    use parking_lot::Mutex;
    use ragdb_core::{Error, Result, TokenCounter};
    use tokenizers::Tokenizer;
    use tracing::{info, warn};

    use crate::embedder::{l2_normalize, Embedder};

    /// Maximum sequence length for the model.
    const MAX_SEQ_LEN: usize = 512;

    /// Token counter backed by the model's own tokenizer.
    pub struct HfTokenCounter {
        tokenizer: Tokenizer,
    }

    impl TokenCounter for HfTokenCounter {
        fn count_tokens(&self, text: &str) -> usize {
            match self.tokenizer.encode(text, false) {
                Ok(encoding) => encoding.len(),
                Err(e) => {
                    warn!("Tokenization failed, counting characters: {}", e);
                    text.chars().count()
                }
            }
        }
    }

    /// ONNX embedding engine.
    pub struct OnnxEmbedder {
        session: Arc<Mutex<Session>>,
        tokens: HfTokenCounter,
        name: String,
        dimension: usize,
    }

    impl OnnxEmbedder {
        /// Load an ONNX model and tokenizer from the given directory.
        ///
        /// Expects:
        /// - `model_dir/model.onnx`: the ONNX model file
        /// - `model_dir/tokenizer.json`: the HuggingFace tokenizer
        pub fn load(model_dir: &Path, dimension: usize) -> Result<Self> {
            let model_path = model_dir.join("model.onnx");
            let tokenizer_path = model_dir.join("tokenizer.json");

            if !model_path.exists() {
                return Err(Error::Inference(format!(
                    "Model not found: {}",
                    model_path.display()
                )));
            }
            if !tokenizer_path.exists() {
                return Err(Error::Inference(format!(
                    "Tokenizer not found: {}",
                    tokenizer_path.display()
                )));
            }

            // With load-dynamic feature, ORT_DYLIB_PATH env var must point to libonnxruntime.so
            ort::init().commit();

            let session = Session::builder()
                .map_err(|e| Error::Inference(format!("Failed to create session builder: {}", e)))?
                .with_intra_threads(2)
                .map_err(|e| Error::Inference(format!("Failed to set threads: {}", e)))?
                .commit_from_file(&model_path)
                .map_err(|e| Error::Inference(format!("Failed to load ONNX model: {}", e)))?;

            let tokenizer = Tokenizer::from_file(&tokenizer_path)
                .map_err(|e| Error::Inference(format!("Failed to load tokenizer: {}", e)))?;

            let name = model_dir
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("onnx")
                .to_string();

            info!(
                "ONNX embedder loaded: dim={}, model={}",
                dimension,
                model_path.display()
            );

            Ok(Self {
                session: Arc::new(Mutex::new(session)),
                tokens: HfTokenCounter { tokenizer },
                name,
                dimension,
            })
        }

        /// Run inference on one text and mean-pool the token embeddings.
        fn infer(&self, text: &str) -> Result<Array1<f32>> {
            let encoding = self
                .tokens
                .tokenizer
                .encode(text, true)
                .map_err(|e| Error::Inference(format!("Tokenization failed: {}", e)))?;

            let input_ids = encoding.get_ids();
            let attention_mask = encoding.get_attention_mask();

            let seq_len = input_ids.len().min(MAX_SEQ_LEN);
            let input_ids = &input_ids[..seq_len];
            let attention_mask = &attention_mask[..seq_len];

            let ids_data: Vec<i64> = input_ids.iter().map(|&id| id as i64).collect();
            let mask_data: Vec<i64> = attention_mask.iter().map(|&m| m as i64).collect();
            let type_ids_data: Vec<i64> = vec![0i64; seq_len];

            let tensor = |data: Vec<i64>| {
                Tensor::from_array(([1usize, seq_len], data))
                    .map_err(|e| Error::Inference(format!("Failed to create tensor: {}", e)))
            };
            let ids_tensor = tensor(ids_data)?;
            let mask_tensor = tensor(mask_data)?;
            let type_ids_tensor = tensor(type_ids_data)?;

            let mut session = self.session.lock();
            let outputs = session
                .run(ort::inputs![ids_tensor, mask_tensor, type_ids_tensor])
                .map_err(|e| Error::Inference(format!("ONNX inference failed: {}", e)))?;

            // [1, seq_len, dim] token embeddings need mean pooling,
            // [1, dim] sentence embeddings are already pooled.
            let (shape, data) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| Error::Inference(format!("Failed to extract output: {}", e)))?;

            let shape_dims: Vec<i64> = shape.iter().copied().collect();

            let pooled = if shape_dims.len() == 3 {
                let dim = shape_dims[2] as usize;
                let mask_sum: f32 = attention_mask.iter().map(|&m| m as f32).sum();
                if mask_sum < 1e-9 {
                    return Ok(Array1::zeros(dim));
                }

                let mut pooled = Array1::zeros(dim);
                for (i, &m) in attention_mask.iter().enumerate() {
                    if m > 0 {
                        let offset = i * dim;
                        for d in 0..dim {
                            pooled[d] += data[offset + d];
                        }
                    }
                }
                pooled / mask_sum
            } else if shape_dims.len() == 2 {
                let dim = shape_dims[1] as usize;
                Array1::from_vec(data[..dim].to_vec())
            } else {
                return Err(Error::Inference(format!(
                    "Unexpected output shape: {:?}",
                    shape_dims
                )));
            };

            if pooled.len() != self.dimension {
                return Err(Error::Inference(format!(
                    "Model produced {} dimensions, configured for {}",
                    pooled.len(),
                    self.dimension
                )));
            }

            Ok(l2_normalize(pooled))
        }
    }

    impl Embedder for OnnxEmbedder {
        fn model_name(&self) -> &str {
            &self.name
        }

        fn dimension(&self) -> usize {
            self.dimension
        }

        fn embed(&self, texts: &[&str]) -> Result<Vec<Array1<f32>>> {
            // Sequential; the session is behind a mutex anyway.
            texts.iter().map(|t| self.infer(t)).collect()
        }

        fn token_counter(&self) -> &dyn TokenCounter {
            &self.tokens
        }
    }
}

#[cfg(feature = "onnx")]
pub use inner::{HfTokenCounter, OnnxEmbedder};
