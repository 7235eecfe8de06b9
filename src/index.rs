//! # Sentence Index Module
//!
//! ## Purpose
//! Immutable per-document view over the `sentence_mapping` blob persisted at
//! ingestion time. The index is built once per file and then shared read-only
//! with the matcher; all matching-time lookups (normalized sentence text,
//! flattened searchable text, span position map) are precomputed here so each
//! citation marker scans the block list at most once.
//!
//! ## Input/Output Specification
//! - **Input**: `sentence_mapping` JSON blob (span-based or flat block format)
//! - **Output**: Parsed sentences with page/bbox geometry and a flattened
//!   searchable text with byte-range → span mapping
//! - **Errors**: Only for structurally corrupt blobs; empty or absent
//!   mappings are a matter for the caller, not an error here

use crate::errors::{CitationError, Result};
use crate::utils::{normalize_for_match, normalize_text};
use crate::{BBox, SentenceBlock};
use std::collections::HashMap;

/// One sentence of a document, parsed out of its block with everything the
/// matcher needs precomputed.
#[derive(Debug, Clone)]
pub struct ParsedSentence {
    /// Position in the parsed sentence list (reading order)
    pub ordinal: usize,
    /// Full sentence text (spans concatenated in order)
    pub content: String,
    /// Precomputed normalized form for lexical comparison
    pub normalized: String,
    /// Zero-based page number
    pub page_index: usize,
    /// Block category tag
    pub block_type: String,
    /// Primary bounding box (first span)
    pub bbox: BBox,
    /// All bounding boxes when the sentence wraps across lines
    pub bboxes: Vec<BBox>,
}

/// Byte range of one span within the flattened searchable text
#[derive(Debug, Clone)]
pub struct SpanPosition {
    /// Start byte offset in the flattened text
    pub char_start: usize,
    /// End byte offset (exclusive)
    pub char_end: usize,
    /// Ordinal of the owning sentence
    pub sentence_ordinal: usize,
    /// Bounding box of this span
    pub bbox: BBox,
    /// Page of this span
    pub page_index: usize,
}

/// Immutable sentence index for one document
#[derive(Debug, Clone)]
pub struct SentenceIndex {
    file_uuid: String,
    sentences: Vec<ParsedSentence>,
    flat_text: String,
    positions: Vec<SpanPosition>,
}

impl SentenceIndex {
    /// Build an index from already-deserialized sentence blocks.
    ///
    /// Blocks with neither spans nor flat content are skipped, matching the
    /// ingestion pipeline's tolerance for partially extracted pages.
    pub fn from_blocks(file_uuid: impl Into<String>, blocks: &[SentenceBlock]) -> Self {
        let file_uuid = file_uuid.into();
        let mut sentences = Vec::new();
        let mut flat_text = String::new();
        let mut positions = Vec::new();

        for block in blocks {
            let (content, bbox, bboxes, span_texts) = if !block.spans.is_empty() {
                let content: String = block
                    .spans
                    .iter()
                    .map(|span| span.content.as_str())
                    .collect();
                let bboxes: Vec<BBox> = block.spans.iter().map(|span| span.bbox).collect();
                let span_texts: Vec<&str> = block
                    .spans
                    .iter()
                    .map(|span| span.content.as_str())
                    .collect();
                (content, bboxes[0], bboxes, span_texts)
            } else if let (Some(content), Some(bbox)) = (&block.content, block.bbox) {
                (content.clone(), bbox, vec![bbox], vec![content.as_str()])
            } else {
                continue;
            };

            if content.trim().is_empty() {
                continue;
            }

            let ordinal = sentences.len();

            // Flattened text: normalized span contents separated by single
            // spaces, with byte ranges recorded per span.
            for (span_text, span_bbox) in span_texts.iter().zip(bboxes.iter()) {
                let normalized_span = normalize_text(span_text);
                if normalized_span.is_empty() {
                    continue;
                }
                let char_start = flat_text.len();
                flat_text.push_str(&normalized_span);
                positions.push(SpanPosition {
                    char_start,
                    char_end: flat_text.len(),
                    sentence_ordinal: ordinal,
                    bbox: *span_bbox,
                    page_index: block.page_index,
                });
                flat_text.push(' ');
            }

            sentences.push(ParsedSentence {
                ordinal,
                content: content.trim().to_string(),
                normalized: normalize_for_match(&content),
                page_index: block.page_index,
                block_type: block.block_type.clone(),
                bbox,
                bboxes,
            });
        }

        tracing::debug!(
            file_uuid = %file_uuid,
            sentences = sentences.len(),
            "built sentence index"
        );

        Self {
            file_uuid,
            sentences,
            flat_text,
            positions,
        }
    }

    /// Build an index from the persisted JSON blob.
    ///
    /// Accepts either the wrapped form `{"sentence_mapping": [...]}` or a bare
    /// block array. Anything else is a structurally corrupt blob and an error,
    /// not a degradation.
    pub fn from_json(file_uuid: impl Into<String>, value: &serde_json::Value) -> Result<Self> {
        let file_uuid = file_uuid.into();
        let mapping = match value {
            serde_json::Value::Array(_) => value,
            serde_json::Value::Object(object) => {
                object
                    .get("sentence_mapping")
                    .ok_or_else(|| CitationError::InvalidIndex {
                        file_uuid: file_uuid.clone(),
                        details: "missing 'sentence_mapping' key".to_string(),
                    })?
            }
            other => {
                return Err(CitationError::InvalidIndex {
                    file_uuid,
                    details: format!("expected object or array, got {}", json_type_name(other)),
                })
            }
        };

        let blocks: Vec<SentenceBlock> =
            serde_json::from_value(mapping.clone()).map_err(|e| CitationError::InvalidIndex {
                file_uuid: file_uuid.clone(),
                details: format!("sentence_mapping entries malformed: {}", e),
            })?;

        Ok(Self::from_blocks(file_uuid, &blocks))
    }

    pub fn file_uuid(&self) -> &str {
        &self.file_uuid
    }

    /// Parsed sentences in reading order
    pub fn sentences(&self) -> &[ParsedSentence] {
        &self.sentences
    }

    /// Flattened, normalized searchable text (single space between spans)
    pub fn flat_text(&self) -> &str {
        &self.flat_text
    }

    /// Span byte ranges within the flattened text
    pub fn positions(&self) -> &[SpanPosition] {
        &self.positions
    }

    pub fn len(&self) -> usize {
        self.sentences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }

    /// Spans overlapping the byte range `[start, end)` of the flattened text
    pub fn spans_in_range(&self, start: usize, end: usize) -> Vec<&SpanPosition> {
        self.positions
            .iter()
            .filter(|position| !(end <= position.char_start || start >= position.char_end))
            .collect()
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Read-only collection of sentence indexes keyed by file identifier.
///
/// Files without a precomputed mapping (non-PDF sources) are simply absent;
/// the matcher treats absence as expected degradation.
#[derive(Debug, Clone, Default)]
pub struct SentenceIndexSet {
    indexes: HashMap<String, SentenceIndex>,
}

impl SentenceIndexSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, index: SentenceIndex) {
        self.indexes.insert(index.file_uuid().to_string(), index);
    }

    pub fn get(&self, file_uuid: &str) -> Option<&SentenceIndex> {
        self.indexes.get(file_uuid)
    }

    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    /// Build a set from a JSON object mapping `file_uuid` to sentence-mapping
    /// documents, as produced by the ingestion service's batch export.
    pub fn from_json_map(value: &serde_json::Value) -> Result<Self> {
        let object = value.as_object().ok_or_else(|| CitationError::Internal {
            message: "index map must be a JSON object keyed by file_uuid".to_string(),
        })?;

        let mut set = Self::new();
        for (file_uuid, mapping) in object {
            set.insert(SentenceIndex::from_json(file_uuid.clone(), mapping)?);
        }
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_mapping() -> serde_json::Value {
        json!({
            "sentence_mapping": [
                {
                    "index": 0,
                    "page_index": 0,
                    "block_type": "title",
                    "spans": [
                        {"bbox": [51.0, 116.0, 154.0, 146.0], "content": "While and If", "type": "text"}
                    ]
                },
                {
                    "index": 1,
                    "page_index": 0,
                    "block_type": "text",
                    "spans": [
                        {"bbox": [51.0, 150.0, 561.0, 172.0], "content": "Learning to use if and ", "type": "text"},
                        {"bbox": [51.0, 172.0, 561.0, 194.0], "content": "while is an essential skill.", "type": "text"}
                    ]
                }
            ]
        })
    }

    #[test]
    fn builds_from_wrapped_json() {
        let index = SentenceIndex::from_json("f1", &sample_mapping()).unwrap();
        assert_eq!(index.len(), 2);
        let sentence = &index.sentences()[1];
        assert_eq!(
            sentence.content,
            "Learning to use if and while is an essential skill."
        );
        assert_eq!(sentence.bboxes.len(), 2);
        assert_eq!(sentence.bbox, [51.0, 150.0, 561.0, 172.0]);
    }

    #[test]
    fn builds_from_bare_array() {
        let blob = sample_mapping();
        let array = blob.get("sentence_mapping").unwrap().clone();
        let index = SentenceIndex::from_json("f1", &array).unwrap();
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn builds_from_flat_format() {
        let blob = json!([
            {"content": "A short sentence.", "bbox": [1.0, 2.0, 3.0, 4.0], "page_index": 1}
        ]);
        let index = SentenceIndex::from_json("f1", &blob).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.sentences()[0].page_index, 1);
        assert_eq!(index.sentences()[0].bboxes, vec![[1.0, 2.0, 3.0, 4.0]]);
    }

    #[test]
    fn flat_text_tracks_span_positions() {
        let index = SentenceIndex::from_json("f1", &sample_mapping()).unwrap();
        assert!(index.flat_text().contains("while and if"));

        let needle = "learning to use if and";
        let start = index.flat_text().find(needle).unwrap();
        let spans = index.spans_in_range(start, start + needle.len());
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].sentence_ordinal, 1);
    }

    #[test]
    fn skips_empty_blocks() {
        let blob = json!([
            {"index": 0, "page_index": 0, "block_type": "text", "spans": []},
            {"content": "Kept.", "bbox": [0.0, 0.0, 1.0, 1.0]}
        ]);
        let index = SentenceIndex::from_json("f1", &blob).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.sentences()[0].content, "Kept.");
    }

    #[test]
    fn corrupt_blob_is_an_error() {
        let err = SentenceIndex::from_json("f1", &json!("nonsense")).unwrap_err();
        assert_eq!(err.category(), "index");
        let err = SentenceIndex::from_json("f1", &json!({"wrong_key": []})).unwrap_err();
        assert_eq!(err.category(), "index");
    }

    #[test]
    fn index_set_from_json_map() {
        let map = json!({"f1": sample_mapping()});
        let set = SentenceIndexSet::from_json_map(&map).unwrap();
        assert_eq!(set.len(), 1);
        assert!(set.get("f1").is_some());
        assert!(set.get("missing").is_none());
    }
}
