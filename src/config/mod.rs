// Configuration
//
// Settings load from ~/.config/wren/config.toml; a missing file means
// defaults, a malformed one is an error.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::tools::PermissionLevel;
use crate::trigger::DEFAULT_TRIGGER_THRESHOLD;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Cosine-similarity threshold for tool activation.
    pub trigger_threshold: f32,

    /// Permission ceiling for tools attached to backend calls.
    pub max_tool_permission: PermissionLevel,

    /// GloVe-style word-embedding table. Unset disables tool triggering
    /// (the chat still works, fail-open).
    pub embedding_table: Option<PathBuf>,

    pub backend: BackendSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            trigger_threshold: DEFAULT_TRIGGER_THRESHOLD,
            max_tool_permission: PermissionLevel::Full,
            embedding_table: None,
            backend: BackendSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    /// OpenAI-compatible chat-completions endpoint.
    pub endpoint: String,
    pub model: String,
    /// Environment variable holding the API key, if the endpoint needs one.
    pub api_key_env: String,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434/v1/chat/completions".to_string(),
            model: "qwen2.5:3b".to_string(),
            api_key_env: "WREN_API_KEY".to_string(),
        }
    }
}

impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("wren").join("config.toml"))
    }

    /// Load from the default location; defaults when no file exists.
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("invalid config: {}", path.display()))
    }

    /// Resolve the API key from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.backend.api_key_env).ok()
    }
}
