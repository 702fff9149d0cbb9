// src/config/ai.rs
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path};

pub const DEFAULT_AI_CONFIG_PATH: &str = "config/ai.json";
pub const ENV_AI_CONFIG_PATH: &str = "AI_CONFIG_PATH";

fn default_max_attempts() -> u32 {
    3
}
fn default_retry_backoff_ms() -> u64 {
    750
}
fn default_timeout_secs() -> u64 {
    90
}
fn default_max_tokens() -> u32 {
    8000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    pub enabled: bool,
    /// "anthropic" | "openai" (case-insensitive)
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Model used for web-search requests; OpenAI needs a search-capable model here.
    #[serde(default)]
    pub search_model: Option<String>,
    /// "ENV" means: read from ANTHROPIC_API_KEY / OPENAI_API_KEY (by provider)
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// Per-attempt timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: "anthropic".to_string(),
            model: None,
            search_model: None,
            api_key: String::new(),
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            timeout_secs: default_timeout_secs(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl AiConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)?;
        let mut cfg: AiConfig = serde_json::from_str(&data)?;

        // Normalize provider
        cfg.provider = cfg.provider.trim().to_lowercase();
        if cfg.provider == "claude" {
            cfg.provider = "anthropic".to_string();
        }

        // Resolve api key if "ENV" or empty
        let key = cfg.api_key.trim();
        if key.is_empty() || key.eq_ignore_ascii_case("env") {
            cfg.api_key = match cfg.provider.as_str() {
                "anthropic" => env::var("ANTHROPIC_API_KEY").unwrap_or_default(),
                "openai" => env::var("OPENAI_API_KEY").unwrap_or_default(),
                other => anyhow::bail!("Unsupported provider in config: {other}"),
            };
        }

        if cfg.max_attempts == 0 {
            cfg.max_attempts = 1;
        }
        if cfg.timeout_secs == 0 {
            cfg.timeout_secs = default_timeout_secs();
        }

        Ok(cfg)
    }

    /// $AI_CONFIG_PATH, then `config/ai.json`. A missing file means AI is disabled.
    pub fn load_default() -> anyhow::Result<Self> {
        let path = env::var(ENV_AI_CONFIG_PATH).unwrap_or_else(|_| DEFAULT_AI_CONFIG_PATH.into());
        if !Path::new(&path).exists() {
            return Ok(Self::default());
        }
        Self::load_from_file(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[serial_test::serial]
    #[test]
    fn env_key_is_resolved_and_defaults_apply() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("ai.json");
        fs::write(&p, r#"{"enabled":true,"provider":"Claude","api_key":"ENV"}"#).unwrap();
        env::set_var("ANTHROPIC_API_KEY", "sk-test");
        let cfg = AiConfig::load_from_file(&p).unwrap();
        env::remove_var("ANTHROPIC_API_KEY");

        assert_eq!(cfg.provider, "anthropic");
        assert_eq!(cfg.api_key, "sk-test");
        assert_eq!(cfg.max_attempts, 3);
        assert_eq!(cfg.timeout_secs, 90);
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("ai.json");
        fs::write(&p, r#"{"enabled":true,"provider":"acme-llm","api_key":"env"}"#).unwrap();
        assert!(AiConfig::load_from_file(&p).is_err());
    }

    #[serial_test::serial]
    #[test]
    fn missing_file_means_disabled() {
        env::set_var(ENV_AI_CONFIG_PATH, "__ai_config_should_not_exist__.json");
        let cfg = AiConfig::load_default().unwrap();
        env::remove_var(ENV_AI_CONFIG_PATH);
        assert!(!cfg.enabled);
    }
}
