//! Prompt construction for metadata extraction.
//!
//! Pure function of the input text and a fixed template: the raw PDF text is
//! truncated to a per-backend character budget, then embedded under an
//! instruction block carrying the example output schema and the formatting
//! rules. The budget bounds token usage even when the backend imposes its
//! own limit.

use crate::backend::BackendConfig;

/// Character budgets. The cloud backend tolerates a longer excerpt; local
/// models get a tighter one to keep generation latency sane.
pub const CLOUD_CHAR_BUDGET: usize = 4000;
pub const LOCAL_CHAR_BUDGET: usize = 3000;

#[derive(Debug, Clone, Copy)]
pub struct PromptBuilder {
    max_chars: usize,
}

impl PromptBuilder {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    /// Budget matching the configured backend variant.
    pub fn for_backend(config: &BackendConfig) -> Self {
        match config {
            BackendConfig::Cloud(_) => Self::new(CLOUD_CHAR_BUDGET),
            BackendConfig::Local(_) => Self::new(LOCAL_CHAR_BUDGET),
        }
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    pub fn build(&self, text: &str) -> String {
        let excerpt = truncate_chars(text, self.max_chars);
        format!(
            r#"You are a bibliographic assistant. Extract the citation metadata of the academic paper whose text begins below.

Return a single JSON object with exactly these fields:
{{
  "title": "full paper title",
  "authors": ["First Author", "Second Author"],
  "year": 2023,
  "journal": "journal or venue name",
  "volume": "volume number",
  "issue": "issue number",
  "pages": "page range, e.g. 123-145",
  "doi": "10.xxxx/xxxxx",
  "abstract": "the abstract, verbatim",
  "keywords": ["keyword"],
  "confidence": 0.9
}}

Rules:
- Return JSON only, with no markdown fences or commentary.
- Use null or an empty string for any field you are not sure about.
- "authors" must be an array of names, never one concatenated string.
- Copy the abstract verbatim from the text; do not summarize it.

PAPER TEXT:
{excerpt}"#
        )
    }
}

/// Truncate to at most `max_chars` characters, never splitting a code point.
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
