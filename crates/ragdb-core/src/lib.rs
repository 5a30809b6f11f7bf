//! RagDB Core: error taxonomy, configuration, tokenizer contract.

pub mod config;
pub mod error;
pub mod tokenize;

pub use config::{DataPaths, RagConfig, RetrievalConfig};
pub use error::{Error, Result};
pub use tokenize::{CharTokenCounter, TokenCounter, WordTokenCounter};
