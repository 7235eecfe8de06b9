//! # Sentence-Citation Matching Engine
//!
//! ## Overview
//! This library anchors LLM-generated citations to page/bounding-box locations
//! in source documents so a chat UI can highlight the exact sentences the model
//! drew from. Given the model's raw output and the retrieval metadata for one
//! turn, it parses declared citation spans, fuzzy-matches them against a
//! precomputed per-document sentence index, and joins the matches back onto the
//! reference list.
//!
//! ## Architecture
//! The system is composed of several key modules:
//! - `parser`: Structured-citation parsing of raw model output
//! - `index`: Immutable per-document sentence index with page/bbox geometry
//! - `similarity`: Pluggable lexical similarity scoring
//! - `matcher`: Exact and fuzzy matching of citation markers to sentences
//! - `enhancer`: Grouping and deduplication into enhanced references
//! - `pipeline`: End-to-end orchestration and degradation policy
//! - `config`: Configuration management and settings
//! - `errors`: Centralized error handling and types
//! - `diagnostics`: Non-fatal per-request diagnostics
//!
//! ## Input/Output Specification
//! - **Input**: Raw model output text, ordered retrieval reference list,
//!   per-file sentence indexes (already loaded, read-only)
//! - **Output**: Cleaned answer text plus enhanced references with
//!   sentence-level bbox anchors and confidence scores
//! - **Guarantees**: Deterministic, synchronous, re-entrant; data-quality
//!   problems degrade the output shape instead of raising
//!
//! ## Usage
//! ```rust,no_run
//! use citation_anchor::{CitationPipeline, Config, SentenceIndexSet};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_file("config.toml")?;
//!     let pipeline = CitationPipeline::new(config.matching.clone())?;
//!     let indexes = SentenceIndexSet::default();
//!     let enhanced = pipeline.run(r#"{"answer":"..."}"#, &[], &indexes);
//!     println!("{} references", enhanced.references.len());
//!     Ok(())
//! }
//! ```

// Core modules
pub mod config;
pub mod diagnostics;
pub mod enhancer;
pub mod errors;
pub mod index;
pub mod matcher;
pub mod parser;
pub mod pipeline;
pub mod similarity;

// Utilities
pub mod utils;

// Re-exports for convenience
pub use config::{Config, MatchingConfig};
pub use diagnostics::{Diagnostic, Severity};
pub use enhancer::EnhancedReference;
pub use errors::{CitationError, Result};
pub use index::{SentenceIndex, SentenceIndexSet};
pub use matcher::{ContextMatcher, MatchResult};
pub use parser::{CitationMarker, ParsedResponse, ResponseParser};
pub use pipeline::{CitationPipeline, EnhancedAnswer, ResponseMode};

use serde::{Deserialize, Serialize};

/// Bounding box in source-document page units: `[x1, y1, x2, y2]`.
pub type BBox = [f64; 4];

/// A single span of text within a sentence block, with its own geometry.
///
/// Blocks that wrap across lines carry one span per rendered line; the spans
/// concatenated in order reconstruct the block's full text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentenceSpan {
    /// Bounding box of this span on the page
    pub bbox: BBox,
    /// Literal text content of the span
    pub content: String,
    /// Span type tag (informational only)
    #[serde(rename = "type", default)]
    pub span_type: Option<String>,
}

/// One entry of a document's sentence mapping, as persisted at ingestion time.
///
/// Two on-disk shapes exist: the span-based form (`spans: [...]`) and an older
/// flat form carrying `content`/`bbox` directly on the block. Both deserialize
/// into this struct; the flat form is normalized by [`index::SentenceIndex`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentenceBlock {
    /// Ordinal position within the document (reading order)
    #[serde(default)]
    pub index: usize,
    /// Zero-based page number
    #[serde(default)]
    pub page_index: usize,
    /// Block category tag (text, title, caption, ...) — no matching effect
    #[serde(default = "default_block_type")]
    pub block_type: String,
    /// Ordered spans making up the block
    #[serde(default)]
    pub spans: Vec<SentenceSpan>,
    /// Flat-format content (older mappings without spans)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Flat-format bbox (older mappings without spans)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BBox>,
}

fn default_block_type() -> String {
    "text".to_string()
}

/// One entry of the ordered reference list produced by the retrieval stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalReference {
    /// Hierarchical topic path of the source chunk
    pub topic_path: String,
    /// URL of the source document, if any
    #[serde(default)]
    pub url: Option<String>,
    /// Path of the source file within the course corpus
    pub file_path: String,
    /// Identifier of the source document
    pub file_uuid: String,
    /// Index of the retrieved chunk within the file
    #[serde(deserialize_with = "de_chunk_index")]
    pub chunk_index: i64,
}

// Retrieval metadata sometimes round-trips chunk indices through JSON as
// floats; accept both and coerce.
fn de_chunk_index<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Number::deserialize(deserializer)?;
    if let Some(n) = value.as_i64() {
        Ok(n)
    } else if let Some(f) = value.as_f64() {
        Ok(f as i64)
    } else {
        Err(serde::de::Error::custom(format!(
            "chunk_index is not a representable number: {}",
            value
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_accepts_float_chunk_index() {
        let raw = r#"{
            "topic_path": "CS61A > Disc 01",
            "url": null,
            "file_path": "CS61A/disc01.pdf",
            "file_uuid": "f1",
            "chunk_index": 5.0
        }"#;
        let reference: RetrievalReference = serde_json::from_str(raw).unwrap();
        assert_eq!(reference.chunk_index, 5);
    }

    #[test]
    fn block_deserializes_span_format() {
        let raw = r#"{
            "index": 0,
            "page_index": 2,
            "block_type": "title",
            "spans": [{"bbox": [51.0, 116.0, 154.0, 146.0], "content": "While and If", "type": "text"}]
        }"#;
        let block: SentenceBlock = serde_json::from_str(raw).unwrap();
        assert_eq!(block.page_index, 2);
        assert_eq!(block.spans.len(), 1);
        assert_eq!(block.spans[0].content, "While and If");
    }

    #[test]
    fn block_deserializes_flat_format() {
        let raw = r#"{"content": "A short sentence.", "bbox": [1.0, 2.0, 3.0, 4.0]}"#;
        let block: SentenceBlock = serde_json::from_str(raw).unwrap();
        assert_eq!(block.content.as_deref(), Some("A short sentence."));
        assert_eq!(block.block_type, "text");
        assert!(block.spans.is_empty());
    }
}
