//! Canonical bibliographic record produced by every successful extraction.
//!
//! Every field is always present in serialized output: absent source fields
//! resolve to an empty string, an empty sequence, or `null` — never to a
//! missing key. Reference managers consuming this record rely on that.

use serde::{Deserialize, Serialize};

/// Confidence assigned when the backend omits or zeroes the field.
pub const DEFAULT_CONFIDENCE: f32 = 0.8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    #[serde(default)]
    pub title: String,
    /// Citation order is insertion order; duplicates are not collapsed.
    #[serde(default)]
    pub authors: Vec<String>,
    /// `None` when the source gave no parseable year.
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub journal: String,
    #[serde(default)]
    pub volume: String,
    #[serde(default)]
    pub issue: String,
    #[serde(default)]
    pub pages: String,
    #[serde(default)]
    pub doi: String,
    #[serde(rename = "abstract", default)]
    pub abstract_text: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
}

fn default_confidence() -> f32 {
    DEFAULT_CONFIDENCE
}

impl Default for MetadataRecord {
    fn default() -> Self {
        Self {
            title: String::new(),
            authors: Vec::new(),
            year: None,
            journal: String::new(),
            volume: String::new(),
            issue: String::new(),
            pages: String::new(),
            doi: String::new(),
            abstract_text: String::new(),
            keywords: Vec::new(),
            confidence: DEFAULT_CONFIDENCE,
        }
    }
}

impl MetadataRecord {
    /// True when the bibliographic core (title, authors, year) is populated.
    /// A record without it is still valid, just low-information.
    pub fn has_core_fields(&self) -> bool {
        !self.title.trim().is_empty() && !self.authors.is_empty() && self.year.is_some()
    }
}
