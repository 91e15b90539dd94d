//! Chat-completions cloud backend.
//!
//! Single-turn request against an OpenAI-compatible endpoint. When the
//! service supports it, `response_format: json_object` constrains the model
//! to emit a bare JSON object; the parser downstream still treats the payload
//! defensively.

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::backend::{BackendError, CloudConfig, ExtractionBackend};

pub struct CloudBackend {
    config: CloudConfig,
    client: reqwest::Client,
}

impl CloudBackend {
    pub fn new(config: CloudConfig) -> Self {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().unwrap_or_else(|_| reqwest::Client::new());
        Self { config, client }
    }
}

#[async_trait]
impl ExtractionBackend for CloudBackend {
    async fn send(&self, prompt: &str) -> Result<String, BackendError> {
        if self.config.api_key.trim().is_empty() {
            return Err(BackendError::Auth("API key is not set".to_string()));
        }

        let body = json!({
            "model":       self.config.model,
            "messages":    [{ "role": "user", "content": prompt }],
            "max_tokens":  self.config.max_output_tokens,
            "temperature": self.config.temperature,
            "response_format": { "type": "json_object" },
        });

        let resp = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(BackendError::from_reqwest)?;

        let status = resp.status().as_u16();
        let text = resp.text().await.map_err(BackendError::from_reqwest)?;
        let json: serde_json::Value =
            serde_json::from_str(&text).unwrap_or(serde_json::Value::Null);

        if !(200..300).contains(&status) {
            return Err(classify_upstream(status, &json));
        }

        debug!(backend = "cloud", bytes = text.len(), "backend response received");
        content_from_response(&json)
    }

    fn name(&self) -> &'static str {
        "cloud"
    }

    fn is_local(&self) -> bool {
        false
    }
}

/// Pull the completion text out of a chat-completions response body.
/// A body without it indicates a protocol mismatch, not a transient failure.
fn content_from_response(body: &serde_json::Value) -> Result<String, BackendError> {
    body["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| {
            BackendError::InvalidResponse("missing choices[0].message.content".to_string())
        })
}

fn classify_upstream(status: u16, body: &serde_json::Value) -> BackendError {
    let message = body["error"]["message"]
        .as_str()
        .or_else(|| body["message"].as_str())
        .unwrap_or("unknown API error")
        .to_string();
    if status == 401 || status == 403 {
        BackendError::Auth(message)
    } else {
        BackendError::Upstream { status, message }
    }
}
