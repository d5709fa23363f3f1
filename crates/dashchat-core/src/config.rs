//! Configuration management for DashChat.
//!
//! Precedence, lowest first: built-in defaults, the TOML config file,
//! `.env`, process environment.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{DashChatError, Result};
use crate::orchestrator::OrchestratorConfig;
use crate::provider::ProviderConfig;

/// Top-level DashChat configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DashChatConfig {
    /// Model provider settings.
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Tool-calling loop settings.
    #[serde(default)]
    pub orchestrator: OrchestratorSettings,

    /// Upstream endpoints used by tools and geodata routes.
    #[serde(default)]
    pub tools: ToolSettings,

    /// Conversation log backend.
    #[serde(default)]
    pub store: StoreSettings,

    /// HTTP server.
    #[serde(default)]
    pub server: ServerSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorSettings {
    #[serde(default = "default_max_round_trips")]
    pub max_round_trips: usize,
    pub system_instruction: Option<String>,
}

fn default_max_round_trips() -> usize {
    8
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            max_round_trips: default_max_round_trips(),
            system_instruction: None,
        }
    }
}

impl From<&OrchestratorSettings> for OrchestratorConfig {
    fn from(s: &OrchestratorSettings) -> Self {
        Self {
            max_round_trips: s.max_round_trips,
            system_instruction: s.system_instruction.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSettings {
    /// Timeout for every outbound tool call.
    #[serde(default = "default_tool_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_data_gov_base")]
    pub data_gov_base: String,
    #[serde(default = "default_data_gov_datasets_base")]
    pub data_gov_datasets_base: String,
    #[serde(default = "default_web_search_base")]
    pub web_search_base: String,
    pub web_search_key: Option<String>,
    #[serde(default = "default_deep_search_base")]
    pub deep_search_base: String,
    #[serde(default = "default_deep_search_max_iter")]
    pub deep_search_max_iter: u32,
}

fn default_tool_timeout() -> u64 {
    30
}

fn default_data_gov_base() -> String {
    "https://api.data.gov.sg".to_string()
}

fn default_data_gov_datasets_base() -> String {
    "https://api-open.data.gov.sg".to_string()
}

fn default_web_search_base() -> String {
    "https://s.jina.ai".to_string()
}

fn default_deep_search_base() -> String {
    "http://localhost:8000".to_string()
}

fn default_deep_search_max_iter() -> u32 {
    3
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_tool_timeout(),
            data_gov_base: default_data_gov_base(),
            data_gov_datasets_base: default_data_gov_datasets_base(),
            web_search_base: default_web_search_base(),
            web_search_key: None,
            deep_search_base: default_deep_search_base(),
            deep_search_max_iter: default_deep_search_max_iter(),
        }
    }
}

/// Which datastore holds the conversation log.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Supabase,
    Sqlite,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSettings {
    #[serde(default)]
    pub backend: StoreBackend,
    /// Supabase project URL.
    pub url: Option<String>,
    /// Supabase API key.
    pub key: Option<String>,
    /// SQLite file (None = in-memory).
    pub sqlite_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Required bearer / `X-API-Key` token. None leaves the API open.
    pub api_key: Option<String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            api_key: None,
        }
    }
}

impl DashChatConfig {
    /// Load config from a TOML file. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| DashChatError::Config(format!("Failed to read config: {}", e)))?;
        toml::from_str(&content)
            .map_err(|e| DashChatError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Load the file, then `.env`, then the process environment.
    pub fn load_with_env(path: &Path) -> Result<Self> {
        let mut config = Self::load(path)?;
        if let Ok(env_path) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {}", env_path.display());
        }
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Override fields from environment variables, read through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = var("GEMINI_API_KEY") {
            self.provider.api_key = Some(v);
        }
        if let Some(v) = var("GEMINI_MODEL") {
            self.provider.model = v;
        }
        if let Some(v) = var("GEMINI_API_BASE") {
            self.provider.api_base = Some(v);
        }
        if let Some(v) = var("SUPABASE_URL") {
            self.store.url = Some(v);
        }
        if let Some(v) = var("SUPABASE_KEY") {
            self.store.key = Some(v);
        }
        if let Some(v) = var("DASHCHAT_STORE") {
            self.store.backend = match v.to_lowercase().as_str() {
                "supabase" => StoreBackend::Supabase,
                "sqlite" => StoreBackend::Sqlite,
                other => {
                    return Err(DashChatError::Config(format!(
                        "DASHCHAT_STORE must be 'supabase' or 'sqlite', got '{}'",
                        other
                    )));
                }
            };
        }
        if let Some(v) = var("DASHCHAT_SQLITE_PATH") {
            self.store.sqlite_path = Some(v);
        }
        if let Some(v) = var("WEB_SEARCH_API_KEY") {
            self.tools.web_search_key = Some(v);
        }
        if let Some(v) = var("DEEPSEARCH_URL") {
            self.tools.deep_search_base = v;
        }
        if let Some(v) = var("DASHCHAT_HOST") {
            self.server.host = v;
        }
        if let Some(v) = var("DASHCHAT_PORT") {
            self.server.port = v
                .parse()
                .map_err(|_| DashChatError::Config(format!("DASHCHAT_PORT is not a port: {}", v)))?;
        }
        if let Some(v) = var("DASHCHAT_API_KEY") {
            self.server.api_key = Some(v);
        }
        if let Some(v) = var("DASHCHAT_MAX_ROUND_TRIPS") {
            self.orchestrator.max_round_trips = v.parse().map_err(|_| {
                DashChatError::Config(format!("DASHCHAT_MAX_ROUND_TRIPS is not a number: {}", v))
            })?;
        }
        Ok(())
    }

    /// Check that every key needed to serve requests is present.
    pub fn validate(&self) -> Result<()> {
        if self.provider.api_key.is_none() {
            return Err(DashChatError::Config(
                "GEMINI_API_KEY not set (environment, .env, or [provider].api_key)".into(),
            ));
        }
        if self.store.backend == StoreBackend::Supabase {
            if self.store.url.is_none() {
                return Err(DashChatError::Config("SUPABASE_URL not set".into()));
            }
            if self.store.key.is_none() {
                return Err(DashChatError::Config("SUPABASE_KEY not set".into()));
            }
        }
        if self.orchestrator.max_round_trips == 0 {
            return Err(DashChatError::Config(
                "orchestrator.max_round_trips must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Copy with secrets masked, for display.
    pub fn redacted(&self) -> Self {
        let mask = |v: &Option<String>| v.as_ref().map(|_| "********".to_string());
        let mut copy = self.clone();
        copy.provider.api_key = mask(&self.provider.api_key);
        copy.store.key = mask(&self.store.key);
        copy.tools.web_search_key = mask(&self.tools.web_search_key);
        copy.server.api_key = mask(&self.server.api_key);
        copy
    }

    /// Get the default config file path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("dashchat")
            .join("config.toml")
    }
}
