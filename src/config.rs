use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Input budgets and windows. The defaults are product tuning values.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub summary_chars: usize,
    pub quiz_chars: usize,
    pub flashcard_chars: usize,
    pub code_chars: usize,
    pub min_input_chars: usize,
    pub min_output_chars: usize,
    pub render_window: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            summary_chars: 30_000,
            quiz_chars: 20_000,
            flashcard_chars: 15_000,
            code_chars: 20_000,
            min_input_chars: 10,
            min_output_chars: 10,
            render_window: 6,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub model: String,
    pub temperature: f64,
    pub max_output_tokens: u32,
    pub timeout_secs: u64,
    pub api_base: String,
    pub api_key_env: String,
    pub limits: Limits,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".to_string(),
            temperature: 0.7,
            max_output_tokens: 8192,
            timeout_secs: 60,
            api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            limits: Limits::default(),
        }
    }
}

impl Config {
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        Self::from_yaml(&std::fs::read_to_string(path)?)
    }

    /// The configured credential. Empty values count as absent.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}
