//! Bot configuration persistence (`bot-config.json`).

use std::path::{Path, PathBuf};

use ragdb_core::Result;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::types::{BotConfigResponse, BotConfigUpdate};

pub const DEFAULT_IDENTITY: &str = "You are a helpful assistant named llama, you are an expert in many subjects and provide carefully researched, thoughtful answers";
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_HISTORY_LINES: usize = 5;
pub const DEFAULT_LLM_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";

/// Stored bot configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default = "default_identity")]
    pub identity: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_history_lines")]
    pub history_lines: usize,
    #[serde(default = "default_rag_enabled")]
    pub rag_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_api_key: Option<String>,
    /// Path to config file for saving.
    #[serde(skip)]
    pub config_path: PathBuf,
}

fn default_identity() -> String {
    DEFAULT_IDENTITY.into()
}
fn default_temperature() -> f64 {
    DEFAULT_TEMPERATURE
}
fn default_history_lines() -> usize {
    DEFAULT_HISTORY_LINES
}
fn default_rag_enabled() -> bool {
    true
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            identity: DEFAULT_IDENTITY.into(),
            temperature: DEFAULT_TEMPERATURE,
            history_lines: DEFAULT_HISTORY_LINES,
            rag_enabled: true,
            llm_url: None,
            llm_model: None,
            llm_api_key: None,
            config_path: PathBuf::new(),
        }
    }
}

impl BotConfig {
    /// Load config from file, falling back to env vars and defaults.
    pub fn load(config_path: &Path) -> Self {
        Self::load_with(config_path, |key| std::env::var(key).ok())
    }

    /// Load with environment lookups resolved through `lookup`.
    pub fn load_with<F>(config_path: &Path, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config: BotConfig = std::fs::read_to_string(config_path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default();

        config.config_path = config_path.to_path_buf();

        if config.llm_url.is_none() {
            config.llm_url = lookup("RAGDB_LLM_URL");
        }
        if config.llm_model.is_none() {
            config.llm_model = lookup("RAGDB_LLM_MODEL");
        }
        if config.llm_api_key.is_none() {
            config.llm_api_key = lookup("RAGDB_LLM_API_KEY");
        }

        config
    }

    /// Save config to disk.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&self.config_path, json)?;
        info!("Saved bot config to {}", self.config_path.display());
        Ok(())
    }

    /// Apply an update, merging with existing config.
    pub fn apply_update(&mut self, update: &BotConfigUpdate) {
        if let Some(identity) = &update.identity {
            self.identity = identity.clone();
        }
        if let Some(t) = update.temperature {
            self.temperature = t.clamp(0.0, 2.0);
        }
        if let Some(n) = update.history_lines {
            self.history_lines = n;
        }
        if let Some(rag) = update.rag_enabled {
            self.rag_enabled = rag;
        }
        if let Some(url) = &update.llm_url {
            self.llm_url = Some(url.clone());
        }
        if let Some(model) = &update.llm_model {
            self.llm_model = Some(model.clone());
        }
        if let Some(key) = &update.llm_api_key {
            self.llm_api_key = Some(key.clone());
        }
    }

    /// Flip the RAG flag, returning the new value.
    pub fn toggle_rag(&mut self) -> bool {
        self.rag_enabled = !self.rag_enabled;
        info!("RAG {}", if self.rag_enabled { "enabled" } else { "disabled" });
        self.rag_enabled
    }

    pub fn llm_url(&self) -> &str {
        self.llm_url.as_deref().unwrap_or(DEFAULT_LLM_URL)
    }

    pub fn llm_model(&self) -> &str {
        self.llm_model.as_deref().unwrap_or(DEFAULT_LLM_MODEL)
    }

    /// Build the public config response (no API key exposed).
    pub fn to_response(&self) -> BotConfigResponse {
        BotConfigResponse {
            identity: self.identity.clone(),
            temperature: self.temperature,
            history_lines: self.history_lines,
            rag_enabled: self.rag_enabled,
            llm_url: self.llm_url().to_string(),
            llm_model: self.llm_model().to_string(),
            llm_key_configured: self.llm_api_key.is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults_when_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let config = BotConfig::load_with(&dir.path().join("bot-config.json"), no_env);
        assert_eq!(config.temperature, 0.7);
        assert_eq!(config.history_lines, 5);
        assert!(config.rag_enabled);
        assert_eq!(config.llm_model(), DEFAULT_LLM_MODEL);
        assert!(config.identity.contains("helpful assistant"));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot-config.json");
        let mut config = BotConfig::load_with(&path, no_env);
        config.apply_update(&BotConfigUpdate {
            identity: Some("You are terse.".into()),
            history_lines: Some(2),
            ..Default::default()
        });
        config.toggle_rag();
        config.save().unwrap();

        let reloaded = BotConfig::load_with(&path, no_env);
        assert_eq!(reloaded.identity, "You are terse.");
        assert_eq!(reloaded.history_lines, 2);
        assert!(!reloaded.rag_enabled);
    }

    #[test]
    fn test_env_fallback_does_not_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot-config.json");
        std::fs::write(&path, r#"{"llm_model": "local-llama"}"#).unwrap();

        let config = BotConfig::load_with(&path, |key| match key {
            "RAGDB_LLM_MODEL" => Some("env-model".into()),
            "RAGDB_LLM_API_KEY" => Some("sk-test".into()),
            _ => None,
        });
        assert_eq!(config.llm_model(), "local-llama");
        assert_eq!(config.llm_api_key.as_deref(), Some("sk-test"));
        assert!(config.to_response().llm_key_configured);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot-config.json");
        std::fs::write(&path, r#"{"temperature": 0.2}"#).unwrap();
        let config = BotConfig::load_with(&path, no_env);
        assert_eq!(config.temperature, 0.2);
        assert_eq!(config.history_lines, DEFAULT_HISTORY_LINES);
    }
}
