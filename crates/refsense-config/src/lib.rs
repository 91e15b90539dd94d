//! Settings loading for refsense.
//! Reads refsense.toml from the current directory or the path in the
//! REFSENSE_CONFIG env var; REFSENSE_API_KEY overrides the stored cloud key.
//!
//! The settings file is the host-side "settings provider": the core never
//! reads it directly — callers materialize a per-call BackendConfig via
//! `backend_config()` and pass that in explicitly.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use refsense_llm::{BackendConfig, CloudConfig, LocalConfig, RetryPolicy, SamplingOptions};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not parse config file: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("configuration error: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// "cloud" or "local".
    #[serde(default = "default_backend_kind")]
    pub backend: String,
    #[serde(default)]
    pub cloud: CloudSettings,
    #[serde(default)]
    pub local: LocalSettings,
    #[serde(default)]
    pub retry: RetrySettings,
}

fn default_backend_kind() -> String {
    "local".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend: default_backend_kind(),
            cloud: CloudSettings::default(),
            local: LocalSettings::default(),
            retry: RetrySettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudSettings {
    #[serde(default = "default_cloud_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_cloud_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_cloud_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}
fn default_cloud_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_max_output_tokens() -> u32 {
    1024
}
fn default_temperature() -> f32 {
    0.1
}

impl Default for CloudSettings {
    fn default() -> Self {
        Self {
            endpoint: default_cloud_endpoint(),
            model: default_cloud_model(),
            api_key: String::new(),
            max_output_tokens: default_max_output_tokens(),
            temperature: default_temperature(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalSettings {
    #[serde(default = "default_local_host")]
    pub host: String,
    #[serde(default = "default_local_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_num_predict")]
    pub num_predict: u32,
    #[serde(default = "default_local_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_local_host() -> String {
    "http://localhost:11434".to_string()
}
fn default_local_model() -> String {
    "llama3:8b".to_string()
}
fn default_top_p() -> f32 {
    0.9
}
fn default_num_predict() -> u32 {
    1024
}
fn default_local_timeout_secs() -> u64 {
    30
}

impl Default for LocalSettings {
    fn default() -> Self {
        Self {
            host: default_local_host(),
            model: default_local_model(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            num_predict: default_num_predict(),
            timeout_secs: default_local_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    1000
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self { max_attempts: default_max_attempts(), base_delay_ms: default_base_delay_ms() }
    }
}

impl Settings {
    /// Load from REFSENSE_CONFIG or ./refsense.toml; a missing file yields
    /// the defaults (local backend against localhost).
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("REFSENSE_CONFIG").unwrap_or_else(|_| "refsense.toml".to_string());
        let path = Path::new(&path);
        if !path.exists() {
            return Ok(Self::apply_env(Settings::default()));
        }
        Self::from_path(path)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&raw)?;
        Ok(Self::apply_env(settings))
    }

    fn apply_env(mut settings: Settings) -> Settings {
        if let Ok(key) = std::env::var("REFSENSE_API_KEY") {
            if !key.is_empty() {
                settings.cloud.api_key = key;
            }
        }
        settings
    }

    /// Materialize the backend selection as an explicit per-call config.
    pub fn backend_config(&self) -> Result<BackendConfig, ConfigError> {
        match self.backend.as_str() {
            "cloud" => Ok(BackendConfig::Cloud(CloudConfig {
                endpoint: self.cloud.endpoint.clone(),
                model: self.cloud.model.clone(),
                api_key: self.cloud.api_key.clone(),
                max_output_tokens: self.cloud.max_output_tokens,
                temperature: self.cloud.temperature,
                request_timeout: None,
            })),
            "local" => Ok(BackendConfig::Local(LocalConfig {
                host: self.local.host.clone(),
                model: self.local.model.clone(),
                options: SamplingOptions {
                    temperature: self.local.temperature,
                    top_p: self.local.top_p,
                    num_predict: self.local.num_predict,
                },
                request_timeout: Duration::from_secs(self.local.timeout_secs),
            })),
            other => Err(ConfigError::Invalid(format!("unknown backend kind: {other}"))),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_toml_fills_defaults() {
        let settings: Settings = toml::from_str("backend = \"local\"").unwrap();
        assert_eq!(settings.local.host, "http://localhost:11434");
        assert_eq!(settings.local.timeout_secs, 30);
        assert_eq!(settings.retry.max_attempts, 3);
        assert_eq!(settings.cloud.model, "gpt-4o-mini");
    }

    #[test]
    fn test_cloud_selection_materializes_cloud_config() {
        let settings: Settings = toml::from_str(
            r#"
            backend = "cloud"

            [cloud]
            model = "gpt-4o"
            api_key = "sk-abcdefghijklmnopqrst"
            "#,
        )
        .unwrap();
        match settings.backend_config().unwrap() {
            BackendConfig::Cloud(cloud) => {
                assert_eq!(cloud.model, "gpt-4o");
                assert_eq!(cloud.max_output_tokens, 1024);
                assert!(cloud.request_timeout.is_none());
            }
            other => panic!("unexpected config: {other:?}"),
        }
    }

    #[test]
    fn test_local_timeout_forwarded() {
        let settings: Settings = toml::from_str(
            r#"
            backend = "local"

            [local]
            model = "mistral:7b"
            timeout_secs = 90
            "#,
        )
        .unwrap();
        match settings.backend_config().unwrap() {
            BackendConfig::Local(local) => {
                assert_eq!(local.model, "mistral:7b");
                assert_eq!(local.request_timeout, Duration::from_secs(90));
            }
            other => panic!("unexpected config: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_backend_kind_rejected() {
        let settings: Settings = toml::from_str("backend = \"mainframe\"").unwrap();
        assert!(matches!(settings.backend_config(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_retry_policy_conversion() {
        let settings: Settings =
            toml::from_str("[retry]\nmax_attempts = 5\nbase_delay_ms = 250").unwrap();
        let policy = settings.retry_policy();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.base_delay, Duration::from_millis(250));
    }
}
