use std::collections::HashMap;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 18790;
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const MAX_COMMAND_BYTES: usize = 16 * 1024; // hard cap on a single chat command
pub const DEFAULT_CHANNEL: &str = "general";

/// Top-level config (switchboard.toml + SWITCHBOARD_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SwitchboardConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub services: ServicesConfig,
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub responder: ResponderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Bearer token required on the HTTP API. `None` disables auth.
    pub token: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
            token: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Model used for narrative responses and the conversational fallback.
    #[serde(default = "default_model")]
    pub model: String,
    /// Model used for intent classification. Cheap and fast is fine here.
    #[serde(default = "default_classifier_model")]
    pub classifier_model: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            classifier_model: default_classifier_model(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    pub anthropic: Option<AnthropicConfig>,
    pub openai: Option<OpenAiProviderConfig>,
    pub ollama: Option<OllamaConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicConfig {
    pub api_key: String,
    #[serde(default = "default_anthropic_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiProviderConfig {
    pub api_key: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_base_url")]
    pub base_url: String,
}

/// Where the per-service clients send their requests.
///
/// The preferred path is a single MCP server exposing one tool per
/// `<service>_<intent>`. The legacy path is a REST bridge per service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicesConfig {
    pub mcp: Option<McpConfig>,
    /// Legacy REST bridges keyed by canonical service name.
    #[serde(default)]
    pub rest: HashMap<String, RestServiceConfig>,
    /// Per-request timeout for service clients.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            mcp: None,
            rest: HashMap::new(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpConfig {
    /// JSON-RPC endpoint, e.g. `http://localhost:8931/mcp`.
    pub endpoint: String,
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestServiceConfig {
    /// Base URL without trailing slash. Intents are POSTed to `{base_url}/{intent}`.
    pub base_url: String,
}

/// Settings for pull-then-push chained commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Messaging channel used when the command names no destination.
    #[serde(default = "default_channel")]
    pub default_channel: String,
    /// How many records the text summary lists before "...and N more".
    #[serde(default = "default_preview_count")]
    pub preview_count: usize,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            default_channel: default_channel(),
            preview_count: default_preview_count(),
        }
    }
}

/// Limits applied before a structured result is handed to the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponderConfig {
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    #[serde(default = "default_max_payload_chars")]
    pub max_payload_chars: usize,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            max_items: default_max_items(),
            max_payload_chars: default_max_payload_chars(),
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_model() -> String {
    "claude-sonnet-4-6".to_string()
}
fn default_classifier_model() -> String {
    "claude-haiku-4-5".to_string()
}
fn default_anthropic_base_url() -> String {
    "https://api.anthropic.com".to_string()
}
fn default_openai_base_url() -> String {
    "https://api.openai.com".to_string()
}
fn default_ollama_base_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_channel() -> String {
    DEFAULT_CHANNEL.to_string()
}
fn default_preview_count() -> usize {
    5
}
fn default_max_items() -> usize {
    10
}
fn default_max_payload_chars() -> usize {
    24_000
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.switchboard/switchboard.db", home)
}

impl SwitchboardConfig {
    /// Load config from a TOML file with SWITCHBOARD_* env var overrides.
    ///
    /// Nested keys use a double underscore so that field names keep their own
    /// underscores: `SWITCHBOARD_CHAIN__DEFAULT_CHANNEL=ops`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: SwitchboardConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("SWITCHBOARD_").split("__"))
            .extract()
            .map_err(|e| crate::error::SwitchboardError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.switchboard/switchboard.toml", home)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_yields_defaults() {
        let config = SwitchboardConfig::load(Some("/nonexistent/switchboard.toml")).unwrap();
        assert_eq!(config.gateway.port, DEFAULT_PORT);
        assert_eq!(config.chain.default_channel, "general");
        assert_eq!(config.responder.max_items, 10);
        assert!(config.services.mcp.is_none());
    }

    #[test]
    fn toml_sections_are_read() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[chain]
default_channel = "marketing"

[services.mcp]
endpoint = "http://localhost:8931/mcp"

[services.rest.shopify]
base_url = "http://localhost:9000/shopify"
"#
        )
        .unwrap();

        let config = SwitchboardConfig::load(file.path().to_str()).unwrap();
        assert_eq!(config.chain.default_channel, "marketing");
        assert_eq!(config.chain.preview_count, 5);
        assert_eq!(
            config.services.mcp.unwrap().endpoint,
            "http://localhost:8931/mcp"
        );
        assert_eq!(
            config.services.rest["shopify"].base_url,
            "http://localhost:9000/shopify"
        );
    }
}
