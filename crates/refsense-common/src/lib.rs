//! refsense-common — shared data model for the extraction pipeline.

pub mod record;

pub use record::{MetadataRecord, DEFAULT_CONFIDENCE};
