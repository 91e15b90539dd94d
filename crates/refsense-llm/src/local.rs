//! Local generate backend (Ollama-compatible servers).
//!
//! Besides the send contract, the local variant exposes two advisory helpers:
//! a connectivity probe and a model listing. Both are UI conveniences and
//! never propagate errors — a dead server answers `false` / an empty list.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::backend::{BackendError, ExtractionBackend, LocalConfig};

const GENERATE_PATH: &str = "/api/generate";
const TAGS_PATH: &str = "/api/tags";

/// Probe and model-list calls are short; a healthy local server answers well
/// under this.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct LocalBackend {
    config: LocalConfig,
    client: reqwest::Client,
}

impl LocalBackend {
    pub fn new(config: LocalConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { config, client }
    }
}

#[async_trait]
impl ExtractionBackend for LocalBackend {
    async fn send(&self, prompt: &str) -> Result<String, BackendError> {
        let url = format!("{}{}", self.config.host.trim_end_matches('/'), GENERATE_PATH);
        let body = json!({
            "model":  self.config.model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": self.config.options.temperature,
                "top_p":       self.config.options.top_p,
                "num_predict": self.config.options.num_predict,
            },
        });

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(BackendError::from_reqwest)?;

        let status = resp.status().as_u16();
        let text = resp.text().await.map_err(BackendError::from_reqwest)?;
        let json: serde_json::Value =
            serde_json::from_str(&text).unwrap_or(serde_json::Value::Null);

        if !(200..300).contains(&status) {
            let message = json["error"]
                .as_str()
                .unwrap_or("unknown server error")
                .to_string();
            return Err(BackendError::Upstream { status, message });
        }

        debug!(backend = "local", bytes = text.len(), "backend response received");
        response_text(&json)
    }

    fn name(&self) -> &'static str {
        "local"
    }

    fn is_local(&self) -> bool {
        true
    }
}

fn response_text(body: &serde_json::Value) -> Result<String, BackendError> {
    body["response"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| BackendError::InvalidResponse("missing response field".to_string()))
}

// ── Advisory helpers ──────────────────────────────────────────────────────────

/// Model descriptor as returned by the local server's tag listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub name: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub modified_at: Option<String>,
}

/// True when the host answers its tag listing with a 2xx inside `timeout`.
pub async fn is_reachable_within(host: &str, timeout: Duration) -> bool {
    let Ok(client) = reqwest::Client::builder().timeout(timeout).build() else {
        return false;
    };
    let url = format!("{}{}", host.trim_end_matches('/'), TAGS_PATH);
    match client.get(&url).send().await {
        Ok(resp) => resp.status().is_success(),
        Err(_) => false,
    }
}

pub async fn is_reachable(host: &str) -> bool {
    is_reachable_within(host, PROBE_TIMEOUT).await
}

/// List the models the local server has pulled. Empty on any failure.
pub async fn list_models(host: &str) -> Vec<ModelDescriptor> {
    let Ok(client) = reqwest::Client::builder().timeout(PROBE_TIMEOUT).build() else {
        return Vec::new();
    };
    let url = format!("{}{}", host.trim_end_matches('/'), TAGS_PATH);
    let body = match client.get(&url).send().await {
        Ok(resp) => match resp.json::<serde_json::Value>().await {
            Ok(body) => body,
            Err(_) => return Vec::new(),
        },
        Err(_) => return Vec::new(),
    };
    parse_model_list(&body)
}

fn parse_model_list(body: &serde_json::Value) -> Vec<ModelDescriptor> {
    body["models"]
        .as_array()
        .map(|models| {
            models
                .iter()
                .filter_map(|m| {
                    let name = m["name"].as_str()?;
                    Some(ModelDescriptor {
                        name: name.to_string(),
                        size: m["size"].as_u64(),
                        modified_at: m["modified_at"].as_str().map(String::from),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}
