//! # Reference Enhancer Module
//!
//! ## Purpose
//! Joins matched sentence locations back onto the retrieval reference list to
//! build the final citation objects consumed by the response assembler. This
//! stage performs no matching; it is pure data shaping and is total: every
//! input reference appears in the output exactly once, with or without
//! sentence detail, so chunk-level callers keep working unchanged.
//!
//! ## Input/Output Specification
//! - **Input**: Match results (marker declaration order) and the original
//!   ordered reference list
//! - **Output**: One [`EnhancedReference`] per input reference, same order
//! - **Grouping**: All sentences for a file attach to the first reference
//!   entry carrying that `file_uuid`; duplicates by
//!   `(file_uuid, page_index, bbox)` are kept once; matches for files not in
//!   the reference list are dropped with a logged notice

use crate::diagnostics::DiagnosticSink;
use crate::matcher::MatchResult;
use crate::utils::bbox_key;
use crate::RetrievalReference;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// A retrieval reference enriched with sentence-level citations
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnhancedReference {
    /// Hierarchical topic path (carried through unchanged)
    pub topic_path: String,
    /// Source URL (carried through unchanged)
    pub url: Option<String>,
    /// Source file path (carried through unchanged)
    pub file_path: String,
    /// Source document identifier
    pub file_uuid: String,
    /// Retrieved chunk index
    pub chunk_index: i64,
    /// Matched sentences in marker declaration order; empty when no marker
    /// resolved to this file
    pub sentences: Vec<MatchResult>,
}

impl EnhancedReference {
    fn from_reference(reference: &RetrievalReference) -> Self {
        Self {
            topic_path: reference.topic_path.clone(),
            url: reference.url.clone(),
            file_path: reference.file_path.clone(),
            file_uuid: reference.file_uuid.clone(),
            chunk_index: reference.chunk_index,
            sentences: Vec::new(),
        }
    }
}

/// Shape match results into the final enhanced reference list.
///
/// Total for well-formed input: the output length always equals
/// `references.len()` regardless of matcher outcomes.
pub fn enhance_references(
    matches: &[MatchResult],
    references: &[RetrievalReference],
    sink: &mut DiagnosticSink,
) -> Vec<EnhancedReference> {
    let mut enhanced: Vec<EnhancedReference> = references
        .iter()
        .map(EnhancedReference::from_reference)
        .collect();

    // Sentences group under the first reference entry for their file.
    let mut first_for_file: HashMap<&str, usize> = HashMap::new();
    for (idx, reference) in references.iter().enumerate() {
        first_for_file
            .entry(reference.file_uuid.as_str())
            .or_insert(idx);
    }

    let mut seen: HashSet<(String, usize, [u64; 4])> = HashSet::new();
    for result in matches {
        let target = match first_for_file.get(result.file_uuid.as_str()) {
            Some(idx) => *idx,
            None => {
                sink.info(
                    "enhancer",
                    format!(
                        "dropping match for file '{}' not present in reference list",
                        result.file_uuid
                    ),
                );
                continue;
            }
        };

        let key = (
            result.file_uuid.clone(),
            result.page_index,
            bbox_key(&result.bbox),
        );
        if !seen.insert(key) {
            continue;
        }

        enhanced[target].sentences.push(result.clone());
    }

    enhanced
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(file_uuid: &str, chunk_index: i64) -> RetrievalReference {
        RetrievalReference {
            topic_path: format!("CS61A > {}", file_uuid),
            url: Some(format!("https://cs61a.org/{}.pdf", file_uuid)),
            file_path: format!("CS61A/{}.pdf", file_uuid),
            file_uuid: file_uuid.to_string(),
            chunk_index,
        }
    }

    fn match_result(file_uuid: &str, page_index: usize, bbox: crate::BBox) -> MatchResult {
        MatchResult {
            file_uuid: file_uuid.to_string(),
            content: "Some matched sentence.".to_string(),
            page_index,
            bbox,
            bboxes: None,
            block_type: "text".to_string(),
            confidence: 1.0,
        }
    }

    #[test]
    fn output_is_total_over_references() {
        let references = vec![reference("f1", 0), reference("f2", 1), reference("f3", 2)];
        let mut sink = DiagnosticSink::new();
        let enhanced = enhance_references(&[], &references, &mut sink);
        assert_eq!(enhanced.len(), 3);
        assert!(enhanced.iter().all(|r| r.sentences.is_empty()));
        assert_eq!(enhanced[0].file_uuid, "f1");
        assert_eq!(enhanced[2].file_uuid, "f3");
    }

    #[test]
    fn duplicate_spans_are_kept_once() {
        let references = vec![reference("f1", 0)];
        let bbox = [51.0, 150.0, 561.0, 172.0];
        let matches = vec![
            match_result("f1", 0, bbox),
            match_result("f1", 0, bbox),
        ];
        let mut sink = DiagnosticSink::new();
        let enhanced = enhance_references(&matches, &references, &mut sink);
        assert_eq!(enhanced[0].sentences.len(), 1);
    }

    #[test]
    fn same_bbox_on_different_pages_is_not_a_duplicate() {
        let references = vec![reference("f1", 0)];
        let bbox = [51.0, 150.0, 561.0, 172.0];
        let matches = vec![
            match_result("f1", 0, bbox),
            match_result("f1", 1, bbox),
        ];
        let mut sink = DiagnosticSink::new();
        let enhanced = enhance_references(&matches, &references, &mut sink);
        assert_eq!(enhanced[0].sentences.len(), 2);
    }

    #[test]
    fn matches_group_under_their_own_files() {
        let references = vec![reference("f1", 0), reference("f2", 1)];
        let matches = vec![
            match_result("f2", 0, [1.0, 1.0, 2.0, 2.0]),
            match_result("f1", 3, [5.0, 5.0, 6.0, 6.0]),
        ];
        let mut sink = DiagnosticSink::new();
        let enhanced = enhance_references(&matches, &references, &mut sink);
        assert_eq!(enhanced[0].sentences.len(), 1);
        assert_eq!(enhanced[0].sentences[0].page_index, 3);
        assert_eq!(enhanced[1].sentences.len(), 1);
        assert_eq!(enhanced[0].topic_path, "CS61A > f1");
        assert_eq!(enhanced[1].url.as_deref(), Some("https://cs61a.org/f2.pdf"));
    }

    #[test]
    fn unknown_file_uuid_is_dropped_with_notice() {
        let references = vec![reference("f1", 0)];
        let matches = vec![match_result("ghost", 0, [1.0, 1.0, 2.0, 2.0])];
        let mut sink = DiagnosticSink::new();
        let enhanced = enhance_references(&matches, &references, &mut sink);
        assert_eq!(enhanced.len(), 1);
        assert!(enhanced[0].sentences.is_empty());
        assert!(!sink.is_empty());
    }

    #[test]
    fn sentences_attach_to_first_entry_for_a_file() {
        // Two chunks of the same file both appear; sentence detail lands on
        // the first, the second stays chunk-level.
        let references = vec![reference("f1", 0), reference("f1", 1)];
        let matches = vec![match_result("f1", 0, [1.0, 1.0, 2.0, 2.0])];
        let mut sink = DiagnosticSink::new();
        let enhanced = enhance_references(&matches, &references, &mut sink);
        assert_eq!(enhanced.len(), 2);
        assert_eq!(enhanced[0].sentences.len(), 1);
        assert!(enhanced[1].sentences.is_empty());
    }

    #[test]
    fn sentence_order_follows_match_order() {
        let references = vec![reference("f1", 0)];
        let matches = vec![
            match_result("f1", 5, [1.0, 1.0, 2.0, 2.0]),
            match_result("f1", 2, [3.0, 3.0, 4.0, 4.0]),
        ];
        let mut sink = DiagnosticSink::new();
        let enhanced = enhance_references(&matches, &references, &mut sink);
        // Marker declaration order, not document order.
        assert_eq!(enhanced[0].sentences[0].page_index, 5);
        assert_eq!(enhanced[0].sentences[1].page_index, 2);
    }
}
