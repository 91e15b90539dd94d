//! Extraction facade: validation, backend dispatch, and error classification.
//!
//! One logical operation per `extract` call, no cross-call state: the
//! backend client and parser are built per call, so callers may run
//! independent extractions concurrently without coordination. Retries live
//! in the backend layer; the service performs none of its own and never
//! caches results.

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use refsense_common::MetadataRecord;
use refsense_llm::{
    build_backend, BackendConfig, BackendError, ExtractionBackend, PromptBuilder, RetryPolicy,
};

use crate::parser::{parse_response, ParseError};

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("invalid input: {0}")]
    Validation(String),
    #[error(transparent)]
    Backend(#[from] BackendError),
    /// Parser failures keep their kind for programmatic handling; the
    /// message gains context for humans.
    #[error("could not parse backend output: {0}")]
    Parse(#[from] ParseError),
}

pub struct MetadataExtractionService {
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl Default for MetadataExtractionService {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataExtractionService {
    pub fn new() -> Self {
        Self::with_retry(RetryPolicy::default())
    }

    pub fn with_retry(retry: RetryPolicy) -> Self {
        Self { retry, cancel: CancellationToken::new() }
    }

    /// Tie in-flight requests and backoff waits to an external cancel signal.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run one extraction against the backend the configuration selects.
    pub async fn extract(
        &self,
        text: &str,
        config: &BackendConfig,
    ) -> Result<MetadataRecord, ExtractError> {
        validate(text, config)?;
        let backend = build_backend(config);
        let prompt = PromptBuilder::for_backend(config);
        self.extract_with(text, backend.as_ref(), &prompt).await
    }

    /// Extraction against an already-built backend. This is the dispatch
    /// seam: tests and embedders can substitute their own implementation.
    pub async fn extract_with(
        &self,
        text: &str,
        backend: &dyn ExtractionBackend,
        prompt: &PromptBuilder,
    ) -> Result<MetadataRecord, ExtractError> {
        if text.trim().is_empty() {
            return Err(ExtractError::Validation("input text is empty".to_string()));
        }

        let rendered = prompt.build(text);
        debug!(
            backend = backend.name(),
            prompt_chars = rendered.chars().count(),
            "sending extraction request"
        );

        let raw = backend.send_with_retry(&rendered, &self.retry, &self.cancel).await?;
        let record = parse_response(&raw)?;

        info!(
            backend = backend.name(),
            core_fields = record.has_core_fields(),
            "extraction complete"
        );
        Ok(record)
    }
}

fn validate(text: &str, config: &BackendConfig) -> Result<(), ExtractError> {
    if text.trim().is_empty() {
        return Err(ExtractError::Validation("input text is empty".to_string()));
    }
    if let BackendConfig::Cloud(cloud) = config {
        let key = cloud.api_key.trim();
        if key.is_empty() {
            return Err(ExtractError::Validation(
                "cloud backend requires an API key".to_string(),
            ));
        }
        if key.len() < 16 {
            return Err(ExtractError::Validation(
                "API key looks malformed (too short)".to_string(),
            ));
        }
    }
    Ok(())
}
