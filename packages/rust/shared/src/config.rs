//! Application configuration for Terminalplex.
//!
//! User config lives at `~/.terminalplex/terminalplex.toml`.
//! Environment variables override config file values, CLI flags override both.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TerminalplexError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "terminalplex.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".terminalplex";

/// Browser-identifying User-Agent sent with every page fetch.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/129.0.0.0 Safari/537.36";

/// Env var overriding `llm.base_url`.
pub const BASE_URL_ENV: &str = "TERMINALPLEX_BASE_URL";
/// Env var overriding `llm.model`.
pub const MODEL_ENV: &str = "TERMINALPLEX_MODEL";
/// Env var overriding `llm.max_tokens`.
pub const MAX_TOKENS_ENV: &str = "TERMINALPLEX_MAX_TOKENS";

// ---------------------------------------------------------------------------
// Config structs (matching terminalplex.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Chat-completion service settings.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Web-search settings.
    #[serde(default)]
    pub search: SearchConfig,

    /// Page fetch and extraction settings.
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Conversation history settings.
    #[serde(default)]
    pub history: HistoryConfig,
}

/// `[llm]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible API (without `/chat/completions`).
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model identifier sent with every request.
    #[serde(default = "default_model")]
    pub model: String,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Output token budget for the cited answer.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Output token budget for the search-query rewrite.
    #[serde(default = "default_reformulate_max_tokens")]
    pub reformulate_max_tokens: u32,

    /// Whole-request timeout for completion calls, in seconds.
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            max_tokens: default_max_tokens(),
            reformulate_max_tokens: default_reformulate_max_tokens(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_api_key_env() -> String {
    "TERMINALPLEX_API_KEY".into()
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_reformulate_max_tokens() -> u32 {
    50
}
fn default_llm_timeout() -> u64 {
    120
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// DuckDuckGo HTML endpoint.
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,

    /// Maximum candidate URLs per turn.
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Extra attempts after a failed search request.
    #[serde(default)]
    pub retries: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: default_search_endpoint(),
            max_results: default_max_results(),
            retries: 0,
        }
    }
}

fn default_search_endpoint() -> String {
    "https://html.duckduckgo.com/html/".into()
}
fn default_max_results() -> usize {
    4
}

/// `[fetch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// User-Agent header for page fetches.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum characters of extracted text kept per page.
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,

    /// Largest response body read per page, in bytes. Larger declared
    /// bodies are rejected; streamed bodies are cut off at this size.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Per-request timeout, in seconds.
    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,

    /// Maximum concurrent page fetches.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Extra attempts after a transient fetch failure (0 = single attempt).
    #[serde(default)]
    pub retries: u32,

    /// Base backoff between attempts; multiplied by the attempt number.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            max_chars: default_max_chars(),
            max_body_bytes: default_max_body_bytes(),
            timeout_secs: default_fetch_timeout(),
            concurrency: default_concurrency(),
            retries: 0,
            retry_backoff_ms: default_retry_backoff(),
        }
    }
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.into()
}
fn default_max_chars() -> usize {
    10_000
}
fn default_max_body_bytes() -> usize {
    2 * 1024 * 1024
}
fn default_fetch_timeout() -> u64 {
    20
}
fn default_concurrency() -> usize {
    4
}
fn default_retry_backoff() -> u64 {
    250
}

/// `[history]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Most recent turns sent to the completion service. Unset = all of them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_turns: Option<usize>,
}

// ---------------------------------------------------------------------------
// Runtime settings (derived from config, passed into components)
// ---------------------------------------------------------------------------

/// Runtime settings for the chat-completion client.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub max_tokens: u32,
    pub reformulate_max_tokens: u32,
    pub timeout: Duration,
    pub history_window: Option<usize>,
}

impl From<&AppConfig> for LlmSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            base_url: config.llm.base_url.clone(),
            model: config.llm.model.clone(),
            api_key: read_env(&config.llm.api_key_env),
            max_tokens: config.llm.max_tokens,
            reformulate_max_tokens: config.llm.reformulate_max_tokens,
            timeout: Duration::from_secs(config.llm.timeout_secs),
            history_window: config.history.max_turns,
        }
    }
}

/// Runtime settings for the search provider.
#[derive(Debug, Clone)]
pub struct SearchSettings {
    pub endpoint: String,
    pub max_results: usize,
    pub retries: u32,
}

impl From<&AppConfig> for SearchSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            endpoint: config.search.endpoint.clone(),
            max_results: config.search.max_results,
            retries: config.search.retries,
        }
    }
}

/// Runtime settings for page fetching and extraction.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub user_agent: String,
    pub max_chars: usize,
    pub max_body_bytes: usize,
    pub timeout: Duration,
    pub concurrency: usize,
    pub retries: u32,
    pub retry_backoff: Duration,
}

impl From<&AppConfig> for FetchSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.fetch.user_agent.clone(),
            max_chars: config.fetch.max_chars,
            max_body_bytes: config.fetch.max_body_bytes.max(1),
            timeout: Duration::from_secs(config.fetch.timeout_secs),
            concurrency: config.fetch.concurrency.max(1),
            retries: config.fetch.retries,
            retry_backoff: Duration::from_millis(config.fetch.retry_backoff_ms),
        }
    }
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.terminalplex/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| TerminalplexError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.terminalplex/terminalplex.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk and apply environment overrides.
/// Returns defaults (plus overrides) if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    let mut config = if path.exists() {
        load_config_from(&path)?
    } else {
        tracing::debug!(?path, "config file not found, using defaults");
        AppConfig::default()
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    Ok(config)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| TerminalplexError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        TerminalplexError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Apply `TERMINALPLEX_*` overrides using `lookup` to read variables.
pub fn apply_env_overrides(
    config: &mut AppConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    let get = |key: &str| {
        lookup(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    if let Some(base_url) = get(BASE_URL_ENV) {
        config.llm.base_url = base_url;
    }
    if let Some(model) = get(MODEL_ENV) {
        config.llm.model = model;
    }
    if let Some(raw) = get(MAX_TOKENS_ENV) {
        config.llm.max_tokens = raw.parse().map_err(|_| {
            TerminalplexError::config(format!("{MAX_TOKENS_ENV} must be an integer, got '{raw}'"))
        })?;
    }

    Ok(())
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| TerminalplexError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| TerminalplexError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| TerminalplexError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check that the API key env var is set and non-empty.
pub fn validate_api_key(config: &AppConfig) -> Result<()> {
    let var_name = &config.llm.api_key_env;
    match read_env(var_name) {
        Some(_) => Ok(()),
        None => Err(TerminalplexError::config(format!(
            "API key not found. Set the {var_name} environment variable."
        ))),
    }
}

fn read_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("base_url"));
        assert!(toml_str.contains("TERMINALPLEX_API_KEY"));
        assert!(!toml_str.contains("max_turns"));
    }

    #[test]
    fn partial_file_fills_defaults() {
        let toml_str = r#"
[llm]
model = "llama-3.1-8b-instant"
base_url = "https://api.groq.com/openai/v1"

[fetch]
max_chars = 500

[history]
max_turns = 6
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.llm.model, "llama-3.1-8b-instant");
        assert_eq!(config.llm.reformulate_max_tokens, 50);
        assert_eq!(config.fetch.max_chars, 500);
        assert_eq!(config.fetch.concurrency, 4);
        assert_eq!(config.fetch.max_body_bytes, 2 * 1024 * 1024);
        assert_eq!(config.search.max_results, 4);
        assert_eq!(config.history.max_turns, Some(6));
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = AppConfig::default();
        apply_env_overrides(&mut config, |key| match key {
            MODEL_ENV => Some("mixtral".into()),
            MAX_TOKENS_ENV => Some(" 256 ".into()),
            BASE_URL_ENV => Some("   ".into()),
            _ => None,
        })
        .expect("overrides");

        assert_eq!(config.llm.model, "mixtral");
        assert_eq!(config.llm.max_tokens, 256);
        assert_eq!(config.llm.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn env_override_rejects_bad_token_budget() {
        let mut config = AppConfig::default();
        let err = apply_env_overrides(&mut config, |key| {
            (key == MAX_TOKENS_ENV).then(|| "lots".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains(MAX_TOKENS_ENV));
    }

    #[test]
    fn fetch_settings_clamp_concurrency() {
        let mut app = AppConfig::default();
        app.fetch.concurrency = 0;
        let fetch = FetchSettings::from(&app);
        assert_eq!(fetch.concurrency, 1);
        assert_eq!(fetch.max_chars, 10_000);
        assert_eq!(fetch.timeout, Duration::from_secs(20));
    }

    #[test]
    fn api_key_validation() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.llm.api_key_env = "TPX_TEST_NONEXISTENT_KEY_12345".into();
        let result = validate_api_key(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API key not found"));
    }
}
