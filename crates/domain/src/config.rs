//! Typed startup configuration.
//!
//! Loaded from a TOML file, then layered with environment-variable
//! overrides, then validated once. Missing/invalid values are a fatal
//! `EngineError::Configuration` (§7) — never a default.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{EngineError, Result};

fn default_fifo_capacity() -> usize {
    50
}
fn default_embedding_dim() -> usize {
    768
}
fn default_hnsw_m() -> usize {
    16
}
fn default_hnsw_ef_construction() -> usize {
    64
}
fn default_hnsw_ef_search() -> usize {
    64
}
fn default_tool_timeout_secs() -> u64 {
    30
}
fn default_tool_output_cap_bytes() -> usize {
    1024 * 1024
}
fn default_file_size_cap_bytes() -> usize {
    10 * 1024 * 1024
}
fn default_tool_iteration_ceiling() -> usize {
    8
}
fn default_log_level() -> String {
    "info".into()
}
fn default_model_id() -> String {
    "gpt-4o-mini".into()
}
fn default_search_limit_default() -> usize {
    5
}
fn default_search_limit_max() -> usize {
    20
}
fn default_find_files_cap() -> usize {
    1000
}

/// Top-level, `serde`-deserializable configuration loaded from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub archival: ArchivalConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            agent: AgentConfig::default(),
            database: DatabaseConfig::default(),
            llm: LlmConfig::default(),
            archival: ArchivalConfig::default(),
            tools: ToolsConfig::default(),
            engine: EngineConfig::default(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub name: String,
    #[serde(default = "default_model_id")]
    pub model_id: String,
    #[serde(default = "default_fifo_capacity")]
    pub fifo_capacity: usize,
    #[serde(default = "default_workspace_root")]
    pub workspace_root: PathBuf,
}

fn default_workspace_root() -> PathBuf {
    PathBuf::from("./workspace")
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "default".into(),
            model_id: default_model_id(),
            fifo_capacity: default_fifo_capacity(),
            workspace_root: default_workspace_root(),
        }
    }
}

/// Relational store connection. Concretely a SQLite file path in this
/// deployment; `url` is named generically to mirror the spec's `vector(D)`
/// relational-store contract (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_pool_min")]
    pub pool_min: u32,
    #[serde(default = "default_pool_max")]
    pub pool_max: u32,
}

fn default_database_url() -> String {
    "memengine.sqlite3".into()
}
fn default_pool_min() -> u32 {
    2
}
fn default_pool_max() -> u32 {
    10
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            pool_min: default_pool_min(),
            pool_max: default_pool_max(),
        }
    }
}

/// Chat/embedding endpoint configuration (§6). Both capabilities are served
/// by one provider-agnostic adapter, matching the corpus's single-`LlmProvider`
/// shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_chat_base_url")]
    pub chat_base_url: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    /// Name of the environment variable holding the API key. Never the key
    /// itself — credentials are never written to the config file (§6).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

fn default_chat_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}
fn default_api_key_env() -> String {
    "MEMENGINE_API_KEY".into()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            chat_base_url: default_chat_base_url(),
            embedding_model: default_embedding_model(),
            api_key_env: default_api_key_env(),
            request_timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchivalConfig {
    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,
    #[serde(default = "default_hnsw_m")]
    pub hnsw_m: usize,
    #[serde(default = "default_hnsw_ef_construction")]
    pub hnsw_ef_construction: usize,
    #[serde(default = "default_hnsw_ef_search")]
    pub hnsw_ef_search: usize,
    #[serde(default = "default_search_limit_default")]
    pub search_limit_default: usize,
    #[serde(default = "default_search_limit_max")]
    pub search_limit_max: usize,
}

impl Default for ArchivalConfig {
    fn default() -> Self {
        Self {
            embedding_dim: default_embedding_dim(),
            hnsw_m: default_hnsw_m(),
            hnsw_ef_construction: default_hnsw_ef_construction(),
            hnsw_ef_search: default_hnsw_ef_search(),
            search_limit_default: default_search_limit_default(),
            search_limit_max: default_search_limit_max(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_tool_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_tool_output_cap_bytes")]
    pub output_cap_bytes: usize,
    #[serde(default = "default_file_size_cap_bytes")]
    pub file_size_cap_bytes: usize,
    #[serde(default = "default_find_files_cap")]
    pub find_files_cap: usize,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_tool_timeout_secs(),
            output_cap_bytes: default_tool_output_cap_bytes(),
            file_size_cap_bytes: default_file_size_cap_bytes(),
            find_files_cap: default_find_files_cap(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_tool_iteration_ceiling")]
    pub tool_iteration_ceiling: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tool_iteration_ceiling: default_tool_iteration_ceiling(),
        }
    }
}

impl Config {
    /// Load from a TOML file (if present), apply environment-variable
    /// overrides, then validate. Environment variables take precedence over
    /// the file; CLI flags (applied by the caller) take precedence over both.
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let mut cfg: Config = if path.exists() {
            let text = std::fs::read_to_string(path)?;
            toml::from_str(&text)
                .map_err(|e| EngineError::Configuration(format!("{}: {}", path.display(), e)))?
        } else {
            Config::default()
        };
        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("MEMENGINE_DATABASE_URL") {
            self.database.url = v;
        }
        if let Ok(v) = std::env::var("MEMENGINE_CHAT_BASE_URL") {
            self.llm.chat_base_url = v;
        }
        if let Ok(v) = std::env::var("MEMENGINE_WORKSPACE") {
            self.agent.workspace_root = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("MEMENGINE_LOG_LEVEL") {
            self.log_level = v;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.database.url.trim().is_empty() {
            return Err(EngineError::Configuration("database.url is empty".into()));
        }
        if self.llm.chat_base_url.trim().is_empty() {
            return Err(EngineError::Configuration(
                "llm.chat_base_url is empty".into(),
            ));
        }
        if self.archival.embedding_dim == 0 {
            return Err(EngineError::Configuration(
                "archival.embedding_dim must be > 0".into(),
            ));
        }
        if self.agent.fifo_capacity == 0 {
            return Err(EngineError::Configuration(
                "agent.fifo_capacity must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Resolve the chat/embedding API key from the configured environment
    /// variable. Never read from the config file itself (§6).
    pub fn api_key(&self) -> Result<String> {
        std::env::var(&self.llm.api_key_env).map_err(|_| {
            EngineError::Configuration(format!(
                "environment variable '{}' not set",
                self.llm.api_key_env
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_internally_consistent() {
        let cfg = Config::default();
        assert_eq!(cfg.agent.fifo_capacity, 50);
        assert_eq!(cfg.archival.embedding_dim, 768);
        assert_eq!(cfg.tools.timeout_secs, 30);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn empty_database_url_fails_validation() {
        let mut cfg = Config::default();
        cfg.database.url = "".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn explicit_toml_overrides_defaults() {
        let toml_str = r#"
[agent]
name = "assistant"
fifo_capacity = 10

[database]
url = "test.sqlite3"
"#;
        let cfg: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.agent.fifo_capacity, 10);
        assert_eq!(cfg.database.url, "test.sqlite3");
        assert_eq!(cfg.archival.embedding_dim, 768);
    }
}
