// src/extractors/mod.rs
pub mod inline;
pub mod instance;
pub mod section;

// Re-export key extraction types for convenience
pub use inline::InlineXbrlParser;
pub use instance::InstanceDocumentParser;
pub use section::{Encoding, EncodingParser, SectionExtractor, SectionKey, SectionSet};
