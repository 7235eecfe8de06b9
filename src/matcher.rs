//! # Context Matcher Module
//!
//! ## Purpose
//! Locates the sentence-index entries backing each citation marker. Quoted
//! markers are searched for verbatim (case/whitespace-normalized) in a
//! flattened view of the document, falling back to per-sentence fuzzy
//! similarity; boundary markers locate a start and end sentence and claim
//! every block between them, inclusive.
//!
//! ## Input/Output Specification
//! - **Input**: One citation marker, the ordered reference list, the loaded
//!   sentence indexes
//! - **Output**: Zero or more [`MatchResult`] values with page/bbox anchors
//!   and a confidence score
//! - **Matching**: Purely lexical; case-insensitive, whitespace and trailing
//!   punctuation tolerant. Fuzzy acceptance is inclusive at the configured
//!   threshold (default 0.85). A marker that matches nothing yields an empty
//!   list, never an error.
//!
//! ## Cost Model
//! All sentence normalization is precomputed at index build time, so each
//! marker makes at most one pass over a file's block list. No state is shared
//! between invocations; the matcher is re-entrant.

use crate::config::MatchingConfig;
use crate::diagnostics::DiagnosticSink;
use crate::index::{ParsedSentence, SentenceIndex, SentenceIndexSet, SpanPosition};
use crate::parser::CitationMarker;
use crate::similarity::{EditDistanceScorer, SimilarityScorer};
use crate::utils::{normalize_for_match, preview};
use crate::{BBox, RetrievalReference};
use serde::Serialize;

/// A citation marker resolved to a concrete location in a source document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    /// Identifier of the source document
    pub file_uuid: String,
    /// Literal matched text (from the sentence index, not the model)
    pub content: String,
    /// Zero-based page number for highlighting
    pub page_index: usize,
    /// Primary bounding box
    pub bbox: BBox,
    /// All bounding boxes when the matched text spans multiple lines
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bboxes: Option<Vec<BBox>>,
    /// Block category tag of the matched sentence
    pub block_type: String,
    /// Match confidence: 1.0 exact containment, below 1.0 fuzzy
    pub confidence: f64,
}

/// Matcher for resolving citation markers against sentence indexes
pub struct ContextMatcher {
    config: MatchingConfig,
    scorer: Box<dyn SimilarityScorer>,
}

impl ContextMatcher {
    /// Create a matcher with the default edit-distance scorer
    pub fn new(config: MatchingConfig) -> Self {
        Self::with_scorer(config, Box::new(EditDistanceScorer))
    }

    /// Create a matcher with a custom similarity strategy
    pub fn with_scorer(config: MatchingConfig, scorer: Box<dyn SimilarityScorer>) -> Self {
        Self { config, scorer }
    }

    /// Resolve one marker to zero or more match results.
    ///
    /// Degradations (unresolved reference number, missing sentence mapping,
    /// below-threshold similarity) are recorded on `sink` and produce an
    /// empty or shortened result list; they never fail the call.
    pub fn match_marker(
        &self,
        marker: &CitationMarker,
        references: &[RetrievalReference],
        indexes: &SentenceIndexSet,
        sink: &mut DiagnosticSink,
    ) -> Vec<MatchResult> {
        let candidate_files = match self.resolve_candidates(marker, references, sink) {
            Some(files) => files,
            None => return Vec::new(),
        };

        let mut results = Vec::new();
        for file_uuid in candidate_files {
            let index = match indexes.get(&file_uuid) {
                Some(index) => index,
                None => {
                    // Expected for non-PDF sources; chunk-level reference only.
                    sink.info(
                        "matcher",
                        format!("no sentence mapping for file '{}'", file_uuid),
                    );
                    continue;
                }
            };

            match marker {
                CitationMarker::Quoted { text } => {
                    results.extend(self.match_quoted(text, index, sink));
                }
                CitationMarker::Boundary { start, end, .. } => {
                    results.extend(self.match_boundary(start, end, index, sink));
                }
            }
        }

        results
    }

    /// Resolve the marker to the files it should be searched in.
    ///
    /// `None` means the marker itself is unusable (out-of-range reference,
    /// too-short text) and was already reported.
    fn resolve_candidates(
        &self,
        marker: &CitationMarker,
        references: &[RetrievalReference],
        sink: &mut DiagnosticSink,
    ) -> Option<Vec<String>> {
        if !self.marker_is_searchable(marker, sink) {
            return None;
        }

        if let CitationMarker::Boundary {
            reference: Some(number),
            ..
        } = marker
        {
            if *number < 1 || *number > references.len() {
                sink.warning(
                    "matcher",
                    format!(
                        "unresolved reference number {} (valid range: 1-{})",
                        number,
                        references.len()
                    ),
                );
                return None;
            }
            return Some(vec![references[*number - 1].file_uuid.clone()]);
        }

        // Raw-text mode: scan every distinct candidate file, reference order.
        let mut files: Vec<String> = Vec::new();
        for reference in references {
            if !files.contains(&reference.file_uuid) {
                files.push(reference.file_uuid.clone());
            }
        }
        Some(files)
    }

    fn marker_is_searchable(&self, marker: &CitationMarker, sink: &mut DiagnosticSink) -> bool {
        let min_chars = self.config.min_marker_chars;
        let too_short = match marker {
            CitationMarker::Quoted { text } => text.chars().count() < min_chars,
            CitationMarker::Boundary { start, end, .. } => {
                start.chars().count() < min_chars || end.chars().count() < min_chars
            }
        };
        if too_short {
            sink.warning(
                "matcher",
                format!("marker text shorter than {} chars, skipped", min_chars),
            );
        }
        !too_short
    }

    /// Quoted mode: exact containment against the flattened text, then
    /// per-sentence fuzzy similarity.
    fn match_quoted(
        &self,
        text: &str,
        index: &SentenceIndex,
        sink: &mut DiagnosticSink,
    ) -> Vec<MatchResult> {
        let needle = normalize_for_match(text);
        if needle.is_empty() {
            return Vec::new();
        }

        // Exact containment across span boundaries.
        if let Some(start) = index.flat_text().find(&needle) {
            let spans = index.spans_in_range(start, start + needle.len());
            if let Some(result) = self.result_from_spans(index, &spans) {
                return vec![result];
            }
        }

        // Fuzzy fallback: best-scoring sentence wins if it clears the bar.
        let mut best: Option<(f64, &ParsedSentence)> = None;
        for sentence in index.sentences() {
            let score = self.scorer.similarity(&needle, &sentence.normalized);
            if score >= self.config.similarity_threshold
                && best.map_or(true, |(best_score, _)| score > best_score)
            {
                best = Some((score, sentence));
            }
        }

        match best {
            Some((score, sentence)) => {
                vec![self.result_from_sentence(index.file_uuid(), sentence, score)]
            }
            None => {
                sink.info(
                    "matcher",
                    format!(
                        "no match above threshold in '{}' for quoted text '{}'",
                        index.file_uuid(),
                        preview(text, 50)
                    ),
                );
                Vec::new()
            }
        }
    }

    /// Boundary mode: locate the start sentence, then the end sentence at or
    /// after it, and claim every block in between, inclusive.
    ///
    /// The end block contributes its full text even when the end phrase falls
    /// mid-block; highlighting a few extra words beats truncating the span.
    fn match_boundary(
        &self,
        start: &str,
        end: &str,
        index: &SentenceIndex,
        sink: &mut DiagnosticSink,
    ) -> Vec<MatchResult> {
        let start_needle = normalize_for_match(start);
        let end_needle = normalize_for_match(end);
        let sentences = index.sentences();

        let (start_idx, start_score) =
            match self.locate_start(&start_needle, sentences) {
                Some(found) => found,
                None => {
                    sink.warning(
                        "matcher",
                        format!(
                            "could not find start text '{}' in '{}'",
                            preview(start, 50),
                            index.file_uuid()
                        ),
                    );
                    return Vec::new();
                }
            };

        let (end_idx, end_score) = match self.locate_end(&end_needle, sentences, start_idx) {
            Some(found) => found,
            None => {
                // Degrade to the start sentence alone rather than dropping
                // the citation entirely.
                sink.info(
                    "matcher",
                    format!(
                        "could not find end text '{}' in '{}', using start sentence only",
                        preview(end, 50),
                        index.file_uuid()
                    ),
                );
                (start_idx, start_score)
            }
        };

        let confidence = (start_score + end_score) / 2.0;
        sentences[start_idx..=end_idx]
            .iter()
            .map(|sentence| self.result_from_sentence(index.file_uuid(), sentence, confidence))
            .collect()
    }

    fn locate_start(
        &self,
        needle: &str,
        sentences: &[ParsedSentence],
    ) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64)> = None;
        for (idx, sentence) in sentences.iter().enumerate() {
            if sentence.normalized.contains(needle) {
                return Some((idx, 1.0));
            }
            let prefix = truncate_chars(&sentence.normalized, needle.chars().count());
            let score = self.scorer.similarity(prefix, needle);
            if score >= self.config.similarity_threshold
                && best.map_or(true, |(_, best_score)| score > best_score)
            {
                best = Some((idx, score));
            }
        }
        best
    }

    fn locate_end(
        &self,
        needle: &str,
        sentences: &[ParsedSentence],
        start_idx: usize,
    ) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64)> = None;
        for (offset, sentence) in sentences[start_idx..].iter().enumerate() {
            let idx = start_idx + offset;
            if sentence.normalized.contains(needle) {
                return Some((idx, 1.0));
            }
            let suffix = truncate_chars_end(&sentence.normalized, needle.chars().count());
            let score = self.scorer.similarity(suffix, needle);
            if score >= self.config.similarity_threshold
                && best.map_or(true, |(_, best_score)| score > best_score)
            {
                best = Some((idx, score));
            }
        }
        best
    }

    fn result_from_sentence(
        &self,
        file_uuid: &str,
        sentence: &ParsedSentence,
        confidence: f64,
    ) -> MatchResult {
        MatchResult {
            file_uuid: file_uuid.to_string(),
            content: sentence.content.clone(),
            page_index: sentence.page_index,
            bbox: sentence.bbox,
            bboxes: if sentence.bboxes.len() > 1 {
                Some(sentence.bboxes.clone())
            } else {
                None
            },
            block_type: sentence.block_type.clone(),
            confidence,
        }
    }

    /// Build an exact-containment result from the spans overlapping the
    /// matched byte range of the flattened text.
    fn result_from_spans(
        &self,
        index: &SentenceIndex,
        spans: &[&SpanPosition],
    ) -> Option<MatchResult> {
        let first = spans.first()?;

        let mut content = String::new();
        let mut last_ordinal = None;
        for span in spans {
            if last_ordinal != Some(span.sentence_ordinal) {
                let sentence = &index.sentences()[span.sentence_ordinal];
                if !content.is_empty() {
                    content.push(' ');
                }
                content.push_str(&sentence.content);
                last_ordinal = Some(span.sentence_ordinal);
            }
        }

        let merged = merge_overlapping_bboxes(spans);
        let block_type = index.sentences()[first.sentence_ordinal].block_type.clone();

        Some(MatchResult {
            file_uuid: index.file_uuid().to_string(),
            content,
            page_index: first.page_index,
            bbox: merged[0],
            bboxes: if merged.len() > 1 { Some(merged) } else { None },
            block_type,
            confidence: 1.0,
        })
    }
}

/// Merge duplicate and overlapping bboxes, page by page, so a multi-line
/// match renders as a minimal set of highlight rectangles.
fn merge_overlapping_bboxes(spans: &[&SpanPosition]) -> Vec<BBox> {
    let mut pages: Vec<usize> = spans.iter().map(|span| span.page_index).collect();
    pages.sort_unstable();
    pages.dedup();

    let mut merged = Vec::new();
    for page in pages {
        let page_boxes: Vec<BBox> = spans
            .iter()
            .filter(|span| span.page_index == page)
            .map(|span| span.bbox)
            .collect();
        merged.extend(merge_bboxes_on_page(&page_boxes));
    }
    merged
}

/// Merge overlapping or identical bboxes on a single page
fn merge_bboxes_on_page(bboxes: &[BBox]) -> Vec<BBox> {
    let mut unique: Vec<BBox> = Vec::new();
    for bbox in bboxes {
        if !unique.contains(bbox) {
            unique.push(*bbox);
        }
    }

    let mut merged = Vec::new();
    let mut used = vec![false; unique.len()];

    for i in 0..unique.len() {
        if used[i] {
            continue;
        }
        let [mut x1, mut y1, mut x2, mut y2] = unique[i];
        used[i] = true;

        for j in (i + 1)..unique.len() {
            if used[j] {
                continue;
            }
            let [ox1, oy1, ox2, oy2] = unique[j];
            if !(x2 < ox1 || x1 > ox2 || y2 < oy1 || y1 > oy2) {
                x1 = x1.min(ox1);
                y1 = y1.min(oy1);
                x2 = x2.max(ox2);
                y2 = y2.max(oy2);
                used[j] = true;
            }
        }

        merged.push([x1, y1, x2, y2]);
    }

    merged
}

/// First `max_chars` chars of `text` (char-boundary safe)
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Last `max_chars` chars of `text` (char-boundary safe)
fn truncate_chars_end(text: &str, max_chars: usize) -> &str {
    let count = text.chars().count();
    if count <= max_chars {
        return text;
    }
    match text.char_indices().nth(count - max_chars) {
        Some((idx, _)) => &text[idx..],
        None => text,
    }
}
