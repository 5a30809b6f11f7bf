//! Chat types for the HTTP surface.

use serde::{Deserialize, Serialize};

/// Chat message in a prompt or conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Incoming chat request.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
    /// Overrides the configured RAG flag for this request.
    #[serde(default, rename = "useRag")]
    pub use_rag: Option<bool>,
}

/// Chat answer with the retrieved chunks it was grounded on.
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub answer: String,
    /// `answer` cut into message-sized parts.
    pub parts: Vec<String>,
    pub model: String,
    #[serde(rename = "usedRag")]
    pub used_rag: bool,
    pub sources: Vec<ChatContext>,
    pub duration: u64,
}

/// Provenance entry for one retrieved chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatContext {
    pub excerpt: String,
    pub distance: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Bot config response (API key masked).
#[derive(Debug, Clone, Serialize)]
pub struct BotConfigResponse {
    pub identity: String,
    pub temperature: f64,
    #[serde(rename = "historyLines")]
    pub history_lines: usize,
    #[serde(rename = "ragEnabled")]
    pub rag_enabled: bool,
    #[serde(rename = "llmUrl")]
    pub llm_url: String,
    #[serde(rename = "llmModel")]
    pub llm_model: String,
    #[serde(rename = "llmKeyConfigured")]
    pub llm_key_configured: bool,
}

/// Bot config update request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BotConfigUpdate {
    pub identity: Option<String>,
    pub temperature: Option<f64>,
    #[serde(rename = "historyLines")]
    pub history_lines: Option<usize>,
    #[serde(rename = "ragEnabled")]
    pub rag_enabled: Option<bool>,
    #[serde(rename = "llmUrl")]
    pub llm_url: Option<String>,
    #[serde(rename = "llmModel")]
    pub llm_model: Option<String>,
    #[serde(rename = "llmApiKey")]
    pub llm_api_key: Option<String>,
}
