//! Runtime configuration: model parameters and data locations.
//!
//! Defaults match the generation settings the companion has always shipped with;
//! environment variables override them for local experiments.

use crate::error::ModelError;
use std::path::PathBuf;

pub const DEFAULT_MODEL: &str = "gemini-pro";
const REQUEST_TIMEOUT_SECS: u64 = 60;
const CONNECT_TIMEOUT_SECS: u64 = 10;

pub const API_KEY_VAR: &str = "GEMINI_API_KEY";
const MODEL_VAR: &str = "SERENITY_MODEL";
const TEMPERATURE_VAR: &str = "SERENITY_TEMPERATURE";
const MAX_TOKENS_VAR: &str = "SERENITY_MAX_TOKENS";
const DATA_DIR_VAR: &str = "SERENITY_DATA_DIR";

#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub model: String,
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.7,
            top_k: 40,
            top_p: 0.95,
            max_output_tokens: 1024,
            request_timeout_secs: REQUEST_TIMEOUT_SECS,
            connect_timeout_secs: CONNECT_TIMEOUT_SECS,
        }
    }
}

impl ModelConfig {
    /// Defaults, overridden by `SERENITY_*` variables. Unparseable values are ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(model) = lookup(MODEL_VAR).filter(|m| !m.trim().is_empty()) {
            config.model = model.trim().to_string();
        }
        if let Some(temp) = lookup(TEMPERATURE_VAR).and_then(|t| t.trim().parse::<f32>().ok()) {
            config.temperature = temp.clamp(0.0, 2.0);
        }
        if let Some(tokens) = lookup(MAX_TOKENS_VAR).and_then(|t| t.trim().parse::<u32>().ok()) {
            config.max_output_tokens = tokens;
        }

        config
    }
}

/// Read the provider API key from the environment
pub fn api_key_from_env() -> Result<String, ModelError> {
    std::env::var(API_KEY_VAR)
        .ok()
        .filter(|k| !k.trim().is_empty())
        .ok_or(ModelError::NoApiKey)
}

/// Data directory: `SERENITY_DATA_DIR`, else `$HOME/.serenity`
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_VAR) {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".serenity")
}

pub fn database_path() -> PathBuf {
    data_dir().join("serenity.db")
}

pub fn log_dir() -> PathBuf {
    data_dir().join("logs")
}
