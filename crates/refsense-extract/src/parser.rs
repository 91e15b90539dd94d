//! Defensive JSON extraction and normalization of backend output.
//!
//! Model responses routinely wrap the JSON object in prose or markdown
//! fences. The payload of interest is the outermost brace-delimited span:
//! first `{` through last `}`. The heuristic is knowingly greedy — unrelated
//! braces in surrounding prose defeat it — but the prompt instructs the
//! model to emit JSON only, so in practice the span is the object.

use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use refsense_common::record::{MetadataRecord, DEFAULT_CONFIDENCE};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("no JSON object found in backend output")]
    NoJsonFound,
    #[error("malformed JSON in backend output: {0}")]
    MalformedJson(String),
}

/// Extract the outermost `{...}` span and map it onto the canonical record.
///
/// Missing title/authors/year are logged but never fail the parse: a
/// low-information record is a quality signal for the caller, not an error.
pub fn parse_response(raw: &str) -> Result<MetadataRecord, ParseError> {
    let start = raw.find('{').ok_or(ParseError::NoJsonFound)?;
    let end = raw.rfind('}').filter(|e| *e > start).ok_or(ParseError::NoJsonFound)?;
    let candidate = &raw[start..=end];

    let value: Value =
        serde_json::from_str(candidate).map_err(|e| ParseError::MalformedJson(e.to_string()))?;

    Ok(normalize(&value))
}

fn normalize(value: &Value) -> MetadataRecord {
    let record = MetadataRecord {
        title: string_field(value, "title"),
        authors: authors_field(&value["authors"]),
        year: year_field(&value["year"]),
        journal: string_field(value, "journal"),
        volume: string_field(value, "volume"),
        issue: string_field(value, "issue"),
        pages: string_field(value, "pages"),
        doi: string_field(value, "doi"),
        abstract_text: string_field(value, "abstract"),
        keywords: keywords_field(&value["keywords"]),
        confidence: confidence_field(&value["confidence"]),
    };

    if record.title.trim().is_empty() {
        warn!("backend output is missing a title");
    }
    if record.authors.is_empty() {
        warn!("backend output is missing authors");
    }
    if record.year.is_none() {
        warn!("backend output is missing a publication year");
    }

    record
}

fn string_field(value: &Value, key: &str) -> String {
    value[key].as_str().unwrap_or("").to_string()
}

/// A bare string becomes a one-element sequence; anything that is neither a
/// string nor an array of strings becomes empty.
fn authors_field(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect(),
        _ => Vec::new(),
    }
}

/// Numbers pass through; numeric-looking strings are parsed; everything else
/// is `None`. Absent numeric fields standardize on null, never "".
fn year_field(value: &Value) -> Option<i32> {
    match value {
        Value::Number(n) => n.as_i64().map(|y| y as i32),
        Value::String(s) => s.trim().parse::<i32>().ok(),
        _ => None,
    }
}

fn keywords_field(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

fn confidence_field(value: &Value) -> f32 {
    match value.as_f64() {
        Some(c) if c > 0.0 => c.clamp(0.0, 1.0) as f32,
        _ => DEFAULT_CONFIDENCE,
    }
}
