use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::ai::OPENROUTER_BASE_URL;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Who replies are written as.
    #[serde(default)]
    pub identity: IdentityConfig,
    /// Completion backend configuration.
    #[serde(default)]
    pub ai: AiConfig,
    /// Reply generation tuning.
    #[serde(default)]
    pub generation: GenerationConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

/// Completion backend configuration. One backend is active per session; any
/// OpenAI-compatible endpoint works through `base_url`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// API key. Falls back to the OPENROUTER_API_KEY environment variable.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

impl AiConfig {
    /// Configured key, or the environment fallback.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var("OPENROUTER_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Custom reply instructions. Blank means the built-in defaults.
    #[serde(default)]
    pub instructions: String,
    /// Approximate token budget for the original email context.
    #[serde(default = "default_email_token_limit")]
    pub email_token_limit: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            instructions: String::new(),
            email_token_limit: default_email_token_limit(),
        }
    }
}

fn default_base_url() -> String {
    OPENROUTER_BASE_URL.to_string()
}

fn default_model() -> String {
    "anthropic/claude-3-haiku".to_string()
}

fn default_max_tokens() -> u32 {
    2000
}

fn default_temperature() -> f32 {
    0.3
}

fn default_email_token_limit() -> usize {
    2000
}

impl Config {
    pub fn config_dir() -> Result<PathBuf> {
        let dir = dirs::config_dir()
            .context("Could not find config directory")?
            .join("redraft");
        Ok(dir)
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    pub fn data_dir() -> Result<PathBuf> {
        let dir = dirs::data_local_dir()
            .context("Could not find data directory")?
            .join("redraft");
        Ok(dir)
    }

    /// Load the config file, or the defaults when none exists yet. The API
    /// key can always come from the environment instead.
    pub fn load_or_default() -> Result<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        let dir = path.parent().unwrap();

        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        fs::create_dir_all(Self::config_dir()?)?;
        fs::create_dir_all(Self::data_dir()?)?;
        Ok(())
    }
}
