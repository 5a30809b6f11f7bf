//! Generation providers.
//!
//! The language model is an opaque function from messages to text. The
//! bundled implementation talks to any OpenAI-compatible chat completions
//! endpoint (OpenAI, Groq, llama.cpp server, vLLM, Ollama).

use std::future::Future;
use std::pin::Pin;

use ragdb_core::{Error, Result};
use reqwest::Client;
use serde_json::json;
use tracing::{debug, error};

use crate::config::BotConfig;
use crate::types::ChatMessage;

/// Boxed future returned by [`Generator::generate`].
pub type BoxedGeneration<'a> = Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;

/// Opaque text generation function.
pub trait Generator: Send + Sync {
    /// Model identifier reported alongside answers.
    fn model(&self) -> &str;

    /// Generate a reply to `messages`.
    fn generate<'a>(&'a self, messages: &'a [ChatMessage], temperature: f64) -> BoxedGeneration<'a>;
}

/// Non-streaming client for OpenAI-compatible chat completions.
pub struct OpenAiCompatGenerator {
    client: Client,
    url: String,
    model: String,
    api_key: Option<String>,
    max_tokens: usize,
}

impl OpenAiCompatGenerator {
    pub fn new(url: impl Into<String>, model: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            model: model.into(),
            api_key,
            max_tokens: 1024,
        }
    }

    pub fn from_config(config: &BotConfig) -> Self {
        Self::new(config.llm_url(), config.llm_model(), config.llm_api_key.clone())
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    async fn complete(&self, messages: &[ChatMessage], temperature: f64) -> Result<String> {
        let msgs: Vec<serde_json::Value> = messages
            .iter()
            .map(|m| json!({"role": m.role, "content": m.content}))
            .collect();
        let body = json!({
            "model": self.model,
            "messages": msgs,
            "temperature": temperature,
            "max_tokens": self.max_tokens,
            "stream": false,
        });

        debug!("Requesting completion from {} with model {}", self.url, self.model);

        let mut request = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Generation(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Generation API error {}: {}", status, body);
            return Err(Error::Generation(format!("API error {}: {}", status, body)));
        }

        let parsed: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::Generation(format!("Invalid response body: {}", e)))?;
        extract_content(&parsed)
    }
}

fn extract_content(parsed: &serde_json::Value) -> Result<String> {
    parsed["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| Error::Generation("Response has no message content".into()))
}

impl Generator for OpenAiCompatGenerator {
    fn model(&self) -> &str {
        &self.model
    }

    fn generate<'a>(&'a self, messages: &'a [ChatMessage], temperature: f64) -> BoxedGeneration<'a> {
        Box::pin(self.complete(messages, temperature))
    }
}
