//! RAG chat: prompt templates, bot configuration and the generation client.
//!
//! The generation function is external: any OpenAI-compatible chat
//! completions endpoint. Retrieval happens in `ragdb-runtime`; this crate
//! only turns a query, its context and the bot identity into messages.

pub mod config;
pub mod prompt;
pub mod providers;
pub mod text;
pub mod types;

pub use config::BotConfig;
pub use prompt::PromptTemplate;
pub use providers::{Generator, OpenAiCompatGenerator};
pub use types::*;
