//! Configuration loading and management for ferriclaw.
//!
//! Loads configuration from `~/.ferriclaw/config.toml` with environment
//! variable overrides (`FERRICLAW_CONFIG` for the file location,
//! `FERRICLAW_API_KEY` for the provider key). Missing file yields
//! defaults; a malformed file is an error.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },

    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to render config: {0}")]
    Render(#[from] toml::ser::Error),
}

/// The root configuration structure, mapping to `config.toml`.
#[derive(Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Workspace directory; defaults to `~/.ferriclaw/workspace`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<PathBuf>,

    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub swarm: SwarmConfig,

    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider name, informational ("openrouter", "openai", "ollama")
    #[serde(default = "default_provider_name")]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_api_base")]
    pub api_base: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_provider_name() -> String {
    "openrouter".into()
}
fn default_api_base() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_model() -> String {
    "anthropic/claude-sonnet-4".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: default_provider_name(),
            api_key: None,
            api_base: default_api_base(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("api_key", &redact(&self.api_key))
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("workspace", &self.workspace)
            .field("provider", &self.provider)
            .field("api", &self.api)
            .field("agent", &self.agent)
            .field("swarm", &self.swarm)
            .field("knowledge", &self.knowledge)
            .field("heartbeat", &self.heartbeat)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Reserved for deployment auth middleware in front of the REST
    /// server. The server itself does not read it; every route is open.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8788
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            api_key: None,
        }
    }
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("api_key", &redact(&self.api_key))
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Tool loop iteration cap for direct processing
    #[serde(default = "default_agent_iterations")]
    pub max_iterations: u32,

    /// Live session ceiling before LRU eviction
    #[serde(default = "default_session_cap")]
    pub session_cap: usize,
}

fn default_agent_iterations() -> u32 {
    25
}
fn default_session_cap() -> usize {
    1024
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_agent_iterations(),
            session_cap: default_session_cap(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmConfig {
    /// Tool loop iteration cap for subagents
    #[serde(default = "default_swarm_iterations")]
    pub max_iterations: u32,
}

fn default_swarm_iterations() -> u32 {
    10
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_swarm_iterations(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    200
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Interval between heartbeats; clamped to a 5 minute floor by the
    /// runner
    #[serde(default = "default_heartbeat_minutes")]
    pub interval_minutes: u64,
}

fn default_heartbeat_minutes() -> u64 {
    30
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_minutes: default_heartbeat_minutes(),
        }
    }
}

impl AppConfig {
    /// Default config file location: `~/.ferriclaw/config.toml`, or the
    /// `FERRICLAW_CONFIG` env override.
    pub fn default_path() -> PathBuf {
        if let Ok(path) = std::env::var("FERRICLAW_CONFIG") {
            return PathBuf::from(path);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".ferriclaw")
            .join("config.toml")
    }

    /// Load from the default location. A missing file yields defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::default_path())
    }

    /// Load from a specific path, applying env overrides afterwards.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.display().to_string(),
                source,
            })?;
            toml::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?
        } else {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            Self::default()
        };

        if let Ok(key) = std::env::var("FERRICLAW_API_KEY") {
            if !key.is_empty() {
                config.provider.api_key = Some(key);
            }
        }

        Ok(config)
    }

    /// Write this config to a path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let rendered = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: path.display().to_string(),
                source,
            })?;
        }
        std::fs::write(path, rendered).map_err(|source| ConfigError::Write {
            path: path.display().to_string(),
            source,
        })
    }

    /// The resolved workspace directory.
    pub fn workspace_path(&self) -> PathBuf {
        self.workspace.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".ferriclaw")
                .join("workspace")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = AppConfig::default();
        assert_eq!(config.agent.max_iterations, 25);
        assert_eq!(config.swarm.max_iterations, 10);
        assert_eq!(config.knowledge.chunk_size, 1000);
        assert_eq!(config.knowledge.chunk_overlap, 200);
        assert_eq!(config.agent.session_cap, 1024);
        assert!(!config.heartbeat.enabled);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config =
            AppConfig::load_from(Path::new("/nonexistent/ferriclaw/config.toml")).unwrap();
        assert_eq!(config.api.port, 8788);
    }

    #[test]
    fn roundtrip_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = AppConfig::default();
        config.provider.model = "test/model".into();
        config.api.port = 9999;
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.provider.model, "test/model");
        assert_eq!(loaded.api.port, 9999);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[provider]\nmodel = \"x/y\"\n").unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.provider.model, "x/y");
        assert_eq!(loaded.agent.max_iterations, 25);
    }

    #[test]
    fn debug_redacts_api_key() {
        let mut config = AppConfig::default();
        config.provider.api_key = Some("sk-secret".into());
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
