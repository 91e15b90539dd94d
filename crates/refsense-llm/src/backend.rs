//! Extraction backend trait, configuration, and the retry driver.
//!
//! Backends:
//!   CloudBackend — chat-completions API (OpenAI-compatible endpoints)
//!   LocalBackend — local generate API (Ollama-compatible servers)
//!
//! Both implement the same contract: one prompt in, the raw textual payload
//! out. Parsing the payload is entirely the extract crate's job.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::cloud::CloudBackend;
use crate::local::LocalBackend;

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("backend error [{status}]: {message}")]
    Upstream { status: u16, message: String },
    #[error("invalid response shape: {0}")]
    InvalidResponse(String),
    #[error("request cancelled")]
    Cancelled,
}

impl BackendError {
    /// Transient failures are retried; everything else surfaces immediately.
    /// 429 is the one 4xx treated as transient.
    pub fn is_transient(&self) -> bool {
        match self {
            BackendError::Network(_) | BackendError::Timeout(_) => true,
            BackendError::Upstream { status, .. } => {
                *status == 429 || (500..=599).contains(status)
            }
            _ => false,
        }
    }

    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BackendError::Timeout(err.to_string())
        } else {
            BackendError::Network(err.to_string())
        }
    }
}

// ── Configuration ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct CloudConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: String,
    pub max_output_tokens: u32,
    pub temperature: f32,
    /// `None` leaves the transport default in place.
    pub request_timeout: Option<Duration>,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: String::new(),
            max_output_tokens: 1024,
            temperature: 0.1,
            request_timeout: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LocalConfig {
    pub host: String,
    pub model: String,
    pub options: SamplingOptions,
    pub request_timeout: Duration,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost:11434".to_string(),
            model: "llama3:8b".to_string(),
            options: SamplingOptions::default(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Sampling parameters forwarded to the local generate endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingOptions {
    pub temperature: f32,
    pub top_p: f32,
    pub num_predict: u32,
}

impl Default for SamplingOptions {
    fn default() -> Self {
        Self { temperature: 0.1, top_p: 0.9, num_predict: 1024 }
    }
}

/// Backend selection plus everything one extraction call needs. Constructed
/// per call by the caller; never read from ambient process state.
#[derive(Debug, Clone)]
pub enum BackendConfig {
    Cloud(CloudConfig),
    Local(LocalConfig),
}

impl BackendConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            BackendConfig::Cloud(_) => "cloud",
            BackendConfig::Local(_) => "local",
        }
    }
}

// ── Retry ─────────────────────────────────────────────────────────────────────

/// Retry schedule for a full send operation. Backoff is exponential:
/// `base_delay * 2^attempt` with a zero-based attempt index.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, base_delay: Duration::from_secs(1) }
    }
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        // Cap the exponent so a misconfigured attempt count cannot overflow.
        self.base_delay * 2u32.saturating_pow(attempt.min(6))
    }
}

// ── Trait ─────────────────────────────────────────────────────────────────────

#[async_trait]
pub trait ExtractionBackend: Send + Sync {
    /// One shot against the backend; returns the raw textual payload.
    async fn send(&self, prompt: &str) -> Result<String, BackendError>;

    /// Backend label used in logs.
    fn name(&self) -> &'static str;

    fn is_local(&self) -> bool;

    /// Drive `send` under the retry policy. Only transient failures are
    /// retried; intermediate ones are logged, the final one is surfaced.
    /// Cancellation aborts the in-flight request and suppresses further
    /// attempts.
    async fn send_with_retry(
        &self,
        prompt: &str,
        policy: &RetryPolicy,
        cancel: &CancellationToken,
    ) -> Result<String, BackendError> {
        let max_attempts = policy.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(BackendError::Cancelled);
            }
            let result = tokio::select! {
                r = self.send(prompt) => r,
                _ = cancel.cancelled() => return Err(BackendError::Cancelled),
            };
            match result {
                Ok(raw) => return Ok(raw),
                Err(err) => {
                    attempt += 1;
                    if !err.is_transient() || attempt >= max_attempts {
                        return Err(err);
                    }
                    let delay = policy.delay_for(attempt - 1);
                    tracing::warn!(
                        backend = self.name(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient backend failure, retrying"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancel.cancelled() => return Err(BackendError::Cancelled),
                    }
                }
            }
        }
    }
}

/// Build the backend variant selected by the configuration.
pub fn build_backend(config: &BackendConfig) -> Box<dyn ExtractionBackend> {
    match config {
        BackendConfig::Cloud(cloud) => Box::new(CloudBackend::new(cloud.clone())),
        BackendConfig::Local(local) => Box::new(LocalBackend::new(local.clone())),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails the first `fail_first` calls with the given error builder,
    /// then answers with a fixed payload.
    struct FlakyBackend<F: Fn() -> BackendError + Send + Sync> {
        calls: AtomicU32,
        fail_first: u32,
        error: F,
    }

    #[async_trait]
    impl<F: Fn() -> BackendError + Send + Sync> ExtractionBackend for FlakyBackend<F> {
        async fn send(&self, _prompt: &str) -> Result<String, BackendError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                Err((self.error)())
            } else {
                Ok("{\"title\":\"ok\"}".to_string())
            }
        }

        fn name(&self) -> &'static str {
            "stub"
        }

        fn is_local(&self) -> bool {
            true
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_retried_until_success() {
        let backend = FlakyBackend {
            calls: AtomicU32::new(0),
            fail_first: 2,
            error: || BackendError::Network("connection reset".to_string()),
        };
        let policy = RetryPolicy::default();
        let start = tokio::time::Instant::now();
        let out = backend
            .send_with_retry("p", &policy, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(out, "{\"title\":\"ok\"}");
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
        // Backoff between the three attempts: 1s then 2s.
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(3), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_secs(4), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_attempts_surface_last_error() {
        let backend = FlakyBackend {
            calls: AtomicU32::new(0),
            fail_first: u32::MAX,
            error: || BackendError::Upstream { status: 503, message: "overloaded".to_string() },
        };
        let err = backend
            .send_with_retry("p", &RetryPolicy::default(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
        assert!(matches!(err, BackendError::Upstream { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_auth_error_is_not_retried() {
        let backend = FlakyBackend {
            calls: AtomicU32::new(0),
            fail_first: u32::MAX,
            error: || BackendError::Auth("bad key".to_string()),
        };
        let err = backend
            .send_with_retry("p", &RetryPolicy::default(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        assert!(matches!(err, BackendError::Auth(_)));
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let backend = FlakyBackend {
            calls: AtomicU32::new(0),
            fail_first: u32::MAX,
            error: || BackendError::Upstream { status: 400, message: "bad request".to_string() },
        };
        let err = backend
            .send_with_retry("p", &RetryPolicy::default(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        assert!(matches!(err, BackendError::Upstream { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_cancelled_token_suppresses_all_attempts() {
        let backend = FlakyBackend {
            calls: AtomicU32::new(0),
            fail_first: 0,
            error: || BackendError::Network("unused".to_string()),
        };
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = backend
            .send_with_retry("p", &RetryPolicy::default(), &cancel)
            .await
            .unwrap_err();
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
        assert!(matches!(err, BackendError::Cancelled));
    }

    #[test]
    fn test_backoff_doubles_per_attempt() {
        let policy = RetryPolicy { max_attempts: 4, base_delay: Duration::from_millis(500) };
        assert_eq!(policy.delay_for(0), Duration::from_millis(500));
        assert_eq!(policy.delay_for(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(2000));
    }

    #[test]
    fn test_transience_classification() {
        assert!(BackendError::Network("x".into()).is_transient());
        assert!(BackendError::Timeout("x".into()).is_transient());
        assert!(BackendError::Upstream { status: 429, message: String::new() }.is_transient());
        assert!(BackendError::Upstream { status: 500, message: String::new() }.is_transient());
        assert!(!BackendError::Upstream { status: 404, message: String::new() }.is_transient());
        assert!(!BackendError::Auth("x".into()).is_transient());
        assert!(!BackendError::InvalidResponse("x".into()).is_transient());
    }

    #[test]
    fn test_backend_config_kind() {
        assert_eq!(BackendConfig::Cloud(CloudConfig::default()).kind(), "cloud");
        assert_eq!(BackendConfig::Local(LocalConfig::default()).kind(), "local");
    }
}
