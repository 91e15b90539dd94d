//! refsense-llm — LLM backend abstraction layer.
//! Prompt construction, the ExtractionBackend trait, and the cloud/local
//! client implementations with retry and backoff.

pub mod backend;
pub mod cloud;
pub mod local;
pub mod prompt;

pub use backend::{
    build_backend, BackendConfig, BackendError, CloudConfig, ExtractionBackend, LocalConfig,
    RetryPolicy, SamplingOptions,
};
pub use cloud::CloudBackend;
pub use local::{is_reachable, list_models, LocalBackend, ModelDescriptor};
pub use prompt::PromptBuilder;
