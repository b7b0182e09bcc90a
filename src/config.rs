//! Configuration management

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use crate::Result;
use crate::error::Error;

/// Supported LLM vendors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Anthropic,
    #[serde(rename = "openai")]
    OpenAi,
    Gemini,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] =
        [ProviderKind::Anthropic, ProviderKind::OpenAi, ProviderKind::Gemini];

    /// Name accepted on the command line and in the config file
    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Gemini => "gemini",
        }
    }

    /// Vendor label used in `"<vendor>/<model-id>"` identifiers
    pub fn vendor(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "Anthropic",
            ProviderKind::OpenAi => "OpenAI",
            ProviderKind::Gemini => "Google",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "claude-sonnet-4-20250514",
            ProviderKind::OpenAi => "gpt-4.1",
            ProviderKind::Gemini => "gemini-2.5-pro",
        }
    }

    /// Environment variable holding the API key
    pub fn api_key_var(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::Gemini => "GOOGLE_API_KEY",
        }
    }

    /// Environment variable that may override the API host
    pub fn host_var(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "ANTHROPIC_BASE_URL",
            ProviderKind::OpenAi => "OPENAI_BASE_URL",
            ProviderKind::Gemini => "GEMINI_BASE_URL",
        }
    }

    pub fn default_host(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "https://api.anthropic.com",
            ProviderKind::OpenAi => "https://api.openai.com",
            ProviderKind::Gemini => "https://generativelanguage.googleapis.com",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ProviderKind::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                let names: Vec<&str> = ProviderKind::ALL.iter().map(|k| k.name()).collect();
                Error::Config(format!("Unknown provider: {s}. Choose from: {}", names.join(", ")))
            })
    }
}

/// Explicit configuration handed to a provider adapter at construction
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub model: String,
    pub api_key: String,
    pub host: String,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl ProviderConfig {
    /// Build a config with an explicit key and the vendor's default host
    pub fn new(kind: ProviderKind, model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            kind,
            model: model.into(),
            api_key: api_key.into(),
            host: kind.default_host().to_string(),
            max_tokens: default_max_tokens(),
            timeout: Duration::from_secs(default_request_timeout_secs()),
        }
    }

    /// Resolve the vendor credential (and optional host override) from the process environment
    pub fn from_env(kind: ProviderKind, model: Option<&str>) -> Result<Self> {
        Self::from_lookup(kind, model, |var| std::env::var(var).ok())
    }

    /// Resolve the vendor credential through an arbitrary variable lookup
    pub fn from_lookup<F>(kind: ProviderKind, model: Option<&str>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(kind.api_key_var())
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::MissingCredential {
                provider: kind.vendor().to_string(),
                var: kind.api_key_var().to_string(),
            })?;

        let model = model.unwrap_or(kind.default_model());
        let mut config = Self::new(kind, model, api_key);

        if let Some(host) = lookup(kind.host_var()).filter(|h| !h.trim().is_empty()) {
            config.host = host.trim().to_string();
        }

        Ok(config)
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Host without a trailing slash, ready for path joining
    pub fn base_url(&self) -> &str {
        self.host.trim_end_matches('/')
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// LLM provider to use
    #[serde(default = "default_provider")]
    pub provider: ProviderKind,

    /// Model override (defaults to the provider's default model)
    #[serde(default)]
    pub model: Option<String>,

    /// Iteration ceiling for a single run
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Completion token limit sent to the vendor
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Timeout for one provider request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Timeout for one tool call
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,

    /// Print progress while the agent works
    #[serde(default = "default_verbose")]
    pub verbose: bool,
}

fn default_provider() -> ProviderKind {
    ProviderKind::Anthropic
}

fn default_max_iterations() -> usize {
    15
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_request_timeout_secs() -> u64 {
    600
}

fn default_tool_timeout_secs() -> u64 {
    60
}

fn default_verbose() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            max_iterations: default_max_iterations(),
            max_tokens: default_max_tokens(),
            request_timeout_secs: default_request_timeout_secs(),
            tool_timeout_secs: default_tool_timeout_secs(),
            verbose: default_verbose(),
        }
    }
}

impl Config {
    /// Provider configuration for the selected vendor, credentials taken from the environment
    pub fn provider_config(&self) -> Result<ProviderConfig> {
        Ok(ProviderConfig::from_env(self.provider, self.model.as_deref())?
            .with_max_tokens(self.max_tokens)
            .with_timeout(Duration::from_secs(self.request_timeout_secs)))
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }
}

/// Get the config directory path
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".uxagent")
}

/// Get the config file path
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

/// Load configuration from file, falling back to defaults when it does not exist
pub fn load() -> Result<Config> {
    load_from(&config_path())
}

pub fn load_from(path: &std::path::Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|e| Error::Config(format!("Invalid config at {:?}: {}", path, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.provider, ProviderKind::Anthropic);
        assert_eq!(config.max_iterations, 15);
        assert_eq!(config.max_tokens, 4096);
        assert!(config.model.is_none());
    }

    #[test]
    fn test_config_partial_file_uses_defaults() {
        let raw = r#"{"provider": "openai", "max_iterations": 4}"#;
        let config: Config = serde_json::from_str(raw).unwrap();
        assert_eq!(config.provider, ProviderKind::OpenAi);
        assert_eq!(config.max_iterations, 4);
        assert_eq!(config.tool_timeout_secs, 60);
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = load_from(&tmp.path().join("nope.json")).unwrap();
        assert_eq!(config.max_iterations, 15);
    }

    #[test]
    fn test_load_malformed_file_is_config_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(load_from(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_provider_kind_parse() {
        assert_eq!("openai".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert_eq!("Gemini".parse::<ProviderKind>().unwrap(), ProviderKind::Gemini);
        let err = "mistral".parse::<ProviderKind>().unwrap_err();
        assert!(err.to_string().contains("Unknown provider: mistral"));
    }

    #[test]
    fn test_from_lookup_missing_key() {
        let result = ProviderConfig::from_lookup(ProviderKind::Gemini, None, lookup_from(&[]));
        match result {
            Err(Error::MissingCredential { var, .. }) => assert_eq!(var, "GOOGLE_API_KEY"),
            other => panic!("expected MissingCredential, got {:?}", other),
        }
    }

    #[test]
    fn test_from_lookup_blank_key_is_missing() {
        let result = ProviderConfig::from_lookup(
            ProviderKind::OpenAi,
            None,
            lookup_from(&[("OPENAI_API_KEY", "   ")]),
        );
        assert!(matches!(result, Err(Error::MissingCredential { .. })));
    }

    #[test]
    fn test_from_lookup_defaults_and_overrides() {
        let config = ProviderConfig::from_lookup(
            ProviderKind::Anthropic,
            None,
            lookup_from(&[
                ("ANTHROPIC_API_KEY", "sk-test"),
                ("ANTHROPIC_BASE_URL", "http://localhost:9/"),
            ]),
        )
        .unwrap();
        assert_eq!(config.api_key, "sk-test");
        assert_eq!(config.model, "claude-sonnet-4-20250514");
        assert_eq!(config.base_url(), "http://localhost:9");

        let config = ProviderConfig::from_lookup(
            ProviderKind::OpenAi,
            Some("gpt-4o-mini"),
            lookup_from(&[("OPENAI_API_KEY", "k")]),
        )
        .unwrap();
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.host, "https://api.openai.com");
    }
}
