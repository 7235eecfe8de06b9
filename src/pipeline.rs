//! # Citation Pipeline Module
//!
//! ## Purpose
//! End-to-end orchestration of one response cycle: parse the raw model output,
//! match every citation marker against the sentence indexes, and shape the
//! results into enhanced references. The degradation policy lives here:
//! STRUCTURED when everything resolved, PARTIAL when the response parsed but
//! some or all markers went unmatched, PLAIN when the output was not
//! structured at all.
//!
//! ## Input/Output Specification
//! - **Input**: Raw model output, ordered reference list, loaded sentence
//!   indexes
//! - **Output**: [`EnhancedAnswer`] — answer text, enhanced references,
//!   response mode, accumulated diagnostics
//! - **Guarantees**: Never fails on data-quality problems; the user always
//!   gets an answer and exactly one enhanced reference per input reference.
//!   Stateless and re-entrant; safe to share across concurrent requests.

use crate::config::{Config, MatchingConfig, ParserConfig};
use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::enhancer::{enhance_references, EnhancedReference};
use crate::errors::Result;
use crate::index::SentenceIndexSet;
use crate::matcher::{ContextMatcher, MatchResult};
use crate::parser::{ParsedResponse, ResponseParser};
use crate::similarity::SimilarityScorer;
use crate::RetrievalReference;
use serde::Serialize;

/// Degradation state of one processed response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    /// JSON parsed and every marker produced at least one match
    Structured,
    /// JSON parsed, but zero valid markers or some markers went unmatched
    Partial,
    /// JSON parsing failed; raw text returned verbatim, chunk-level
    /// references only
    Plain,
}

/// Final output of the citation pipeline for one response
#[derive(Debug, Clone, Serialize)]
pub struct EnhancedAnswer {
    /// Cleaned answer text (or the raw output verbatim in PLAIN mode)
    pub answer: String,
    /// One entry per input reference, original order
    pub references: Vec<EnhancedReference>,
    /// Degradation state reached while processing
    pub mode: ResponseMode,
    /// Non-fatal diagnostics accumulated across all stages
    pub diagnostics: Vec<Diagnostic>,
}

/// Orchestrates parser, matcher, and enhancer for one response cycle
pub struct CitationPipeline {
    parser: ResponseParser,
    matcher: ContextMatcher,
    max_markers: usize,
}

impl CitationPipeline {
    /// Create a pipeline with default parser settings
    pub fn new(matching: MatchingConfig) -> Result<Self> {
        let max_markers = matching.max_markers_per_response;
        Ok(Self {
            parser: ResponseParser::new(ParserConfig::default())?,
            matcher: ContextMatcher::new(matching),
            max_markers,
        })
    }

    /// Create a pipeline from a full configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let max_markers = config.matching.max_markers_per_response;
        Ok(Self {
            parser: ResponseParser::new(config.parser.clone())?,
            matcher: ContextMatcher::new(config.matching.clone()),
            max_markers,
        })
    }

    /// Create a pipeline with a custom similarity strategy
    pub fn with_scorer(
        matching: MatchingConfig,
        scorer: Box<dyn SimilarityScorer>,
    ) -> Result<Self> {
        let max_markers = matching.max_markers_per_response;
        Ok(Self {
            parser: ResponseParser::new(ParserConfig::default())?,
            matcher: ContextMatcher::with_scorer(matching, scorer),
            max_markers,
        })
    }

    /// Process one raw model response against its retrieval context.
    ///
    /// Total for well-formed input: the result always carries an answer and
    /// exactly `references.len()` enhanced references.
    pub fn run(
        &self,
        raw_response: &str,
        references: &[RetrievalReference],
        indexes: &SentenceIndexSet,
    ) -> EnhancedAnswer {
        let mut sink = DiagnosticSink::new();

        let (answer, mode, matches) = match self.parser.parse(raw_response, &mut sink) {
            ParsedResponse::Plain { raw } => (raw, ResponseMode::Plain, Vec::new()),
            ParsedResponse::Structured { answer, markers } => {
                let (mode, matches) = self.match_all(&markers, references, indexes, &mut sink);
                (answer, mode, matches)
            }
        };

        let enhanced = enhance_references(&matches, references, &mut sink);

        tracing::debug!(
            mode = ?mode,
            references = enhanced.len(),
            sentences = matches.len(),
            "citation pipeline finished"
        );

        EnhancedAnswer {
            answer,
            references: enhanced,
            mode,
            diagnostics: sink.into_entries(),
        }
    }

    fn match_all(
        &self,
        markers: &[crate::parser::CitationMarker],
        references: &[RetrievalReference],
        indexes: &SentenceIndexSet,
        sink: &mut DiagnosticSink,
    ) -> (ResponseMode, Vec<MatchResult>) {
        if markers.is_empty() {
            return (ResponseMode::Partial, Vec::new());
        }

        let capped = if markers.len() > self.max_markers {
            sink.warning(
                "matcher",
                format!(
                    "response declared {} markers, processing first {}",
                    markers.len(),
                    self.max_markers
                ),
            );
            &markers[..self.max_markers]
        } else {
            markers
        };

        let mut matches = Vec::new();
        let mut any_unmatched = markers.len() > self.max_markers;
        for marker in capped {
            let marker_matches = self.matcher.match_marker(marker, references, indexes, sink);
            if marker_matches.is_empty() {
                any_unmatched = true;
            }
            matches.extend(marker_matches);
        }

        let mode = if any_unmatched {
            ResponseMode::Partial
        } else {
            ResponseMode::Structured
        };
        (mode, matches)
    }
}
