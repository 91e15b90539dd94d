//! refsense — extract bibliographic metadata from PDF text via an LLM backend.
//!
//! Usage: refsense <text-file> [config-path]
//!
//! The input file holds text already extracted from a PDF (extraction itself
//! is out of scope here). The record is printed as pretty JSON on stdout.

use std::path::Path;

use anyhow::{bail, Context};
use tracing_subscriber::EnvFilter;

use refsense_config::Settings;
use refsense_extract::MetadataExtractionService;
use refsense_llm::BackendConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("refsense=info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let Some(input) = args.next() else {
        bail!("usage: refsense <text-file> [config-path]");
    };
    let settings = match args.next() {
        Some(path) => Settings::from_path(Path::new(&path))?,
        None => Settings::load()?,
    };

    let text = std::fs::read_to_string(&input)
        .with_context(|| format!("could not read input file {input}"))?;
    let config = settings.backend_config()?;

    if let BackendConfig::Local(local) = &config {
        if !refsense_llm::is_reachable(&local.host).await {
            tracing::warn!(host = %local.host, "local backend is not reachable; the request will likely fail");
        }
    }

    let service = MetadataExtractionService::with_retry(settings.retry_policy());
    let record = service
        .extract(&text, &config)
        .await
        .context("metadata extraction failed")?;

    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}
