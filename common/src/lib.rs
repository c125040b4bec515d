/*!
common/src/lib.rs

Shared configuration types for DailyFetch.

This file provides:
- Config data structures (deserialized from TOML, every field defaulted)
- An async loader merging a default file with an optional override file
- Environment overrides applied after file loading
*/

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

pub const DEFAULT_MCP_URL: &str = "http://news_tools:8000/mcp";
pub const DEFAULT_TOOL_NAME: &str = "news_fetcher";

/// HTTP server configuration section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// Directory holding the browser UI; skipped when it does not exist
    pub static_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 80,
            static_dir: "dailyfetch/static".to_string(),
        }
    }
}

/// Tool server (MCP) connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct McpConfig {
    /// Streamable HTTP endpoint, e.g. "http://news_tools:8000/mcp"
    pub url: String,
    /// Explicit health endpoint. Derived from `url` when absent.
    pub health_url: Option<String>,
    /// Applies to a whole session: connect, handshake, call and teardown
    pub timeout_seconds: u64,
    pub health_timeout_seconds: u64,
    pub tool_name: String,
    pub client_name: String,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_MCP_URL.to_string(),
            health_url: None,
            timeout_seconds: 10,
            health_timeout_seconds: 2,
            tool_name: DEFAULT_TOOL_NAME.to_string(),
            client_name: "dailyfetch".to_string(),
        }
    }
}

impl McpConfig {
    /// Health endpoint of the tool server: `health_url` if set, otherwise the
    /// last path segment of `url` replaced by `health`.
    pub fn resolved_health_url(&self) -> Result<String> {
        if let Some(explicit) = &self.health_url {
            return Ok(explicit.clone());
        }
        let base = Url::parse(&self.url)
            .with_context(|| format!("Invalid MCP server URL: {}", self.url))?;
        let health = base
            .join("health")
            .with_context(|| format!("Cannot derive health URL from {}", self.url))?;
        Ok(health.to_string())
    }
}

/// Summarization provider settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// "GOOGLE" selects Gemini, anything else selects OpenAI
    pub provider: String,
    /// Model override for `provider`; each provider has its own default
    pub model: Option<String>,
    /// Environment variable holding the key for `provider`; provider default when absent
    pub api_key_env: Option<String>,
    pub google_base_url: String,
    pub openai_base_url: String,
    pub timeout_seconds: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "GOOGLE".to_string(),
            model: None,
            api_key_env: None,
            google_base_url: "https://generativelanguage.googleapis.com".to_string(),
            openai_base_url: "https://api.openai.com/v1".to_string(),
            timeout_seconds: 60,
        }
    }
}

/// Query defaults and the allow-lists enforced by the HTTP API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub default_categories: Vec<String>,
    pub default_sources: Vec<String>,
    pub allowed_categories: Vec<String>,
    pub allowed_sources: Vec<String>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        Self {
            default_categories: strings(&["general"]),
            default_sources: strings(&["googlenews"]),
            allowed_categories: strings(&[
                "technology",
                "business",
                "entertainment",
                "science",
                "sport",
                "general",
            ]),
            allowed_sources: strings(&["googlenews", "guardian", "reddit"]),
        }
    }
}

/// Top-level application configuration (deserialized from config.toml)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub mcp: McpConfig,
    pub llm: LlmConfig,
    pub query: QueryConfig,
}

impl Config {
    /// Load configuration from a TOML file asynchronously.
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = tokio::fs::read_to_string(path.as_ref())
            .await
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let cfg: Config = toml::from_str(&data).context("Failed to parse TOML configuration")?;
        Ok(cfg)
    }

    /// Load configuration with an optional default file and an optional override file.
    /// If both are present, they are merged (override takes precedence). Missing files
    /// are skipped; with neither present the built-in defaults are returned.
    pub async fn load_with_defaults(
        default_path: Option<&Path>,
        override_path: Option<&Path>,
    ) -> Result<Self> {
        let mut config_value = toml::Value::Table(toml::map::Map::new());

        for path in [default_path, override_path].into_iter().flatten() {
            if !path.exists() {
                continue;
            }
            let data = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            let val: toml::Value = toml::from_str(&data)
                .with_context(|| format!("Failed to parse configuration: {}", path.display()))?;
            merge_toml(&mut config_value, val);
        }

        let cfg: Config = config_value
            .try_into()
            .context("Failed to parse merged configuration")?;
        Ok(cfg)
    }

    /// Apply overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup. Recognised keys:
    /// `DAILYFETCH_MCP_URL`, `MCP_SERVER_PORT`, `DAILYFETCH_LLM_PROVIDER`.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("DAILYFETCH_MCP_URL").filter(|v| !v.is_empty()) {
            self.mcp.url = url;
        }
        if let Some(port) = lookup("MCP_SERVER_PORT").filter(|v| !v.is_empty()) {
            let port: u16 = port
                .parse()
                .with_context(|| format!("MCP_SERVER_PORT is not a port number: {}", port))?;
            let mut url = Url::parse(&self.mcp.url)
                .with_context(|| format!("Invalid MCP server URL: {}", self.mcp.url))?;
            url.set_port(Some(port))
                .map_err(|_| anyhow::anyhow!("Cannot set a port on {}", self.mcp.url))?;
            self.mcp.url = url.to_string();
        }
        if let Some(provider) = lookup("DAILYFETCH_LLM_PROVIDER").filter(|v| !v.is_empty()) {
            self.llm.provider = provider;
        }
        Ok(self)
    }
}

fn merge_toml(a: &mut toml::Value, b: toml::Value) {
    match (a, b) {
        (toml::Value::Table(a_map), toml::Value::Table(b_map)) => {
            for (k, v) in b_map {
                if let Some(a_val) = a_map.get_mut(&k) {
                    merge_toml(a_val, v);
                } else {
                    a_map.insert(k, v);
                }
            }
        }
        (a_val, b_val) => *a_val = b_val,
    }
}
