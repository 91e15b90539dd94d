//! refsense-extract — response normalization and the extraction facade.
//! Turns a backend's loosely structured output into the canonical
//! MetadataRecord, and drives prompt → backend → parser for one call.

pub mod parser;
pub mod service;

pub use parser::{parse_response, ParseError};
pub use service::{ExtractError, MetadataExtractionService};
