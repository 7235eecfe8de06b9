//! # Structured-Citation Parser Module
//!
//! ## Purpose
//! Extracts the answer text and the model-declared citation markers from one
//! turn of raw LLM output. The model is instructed to reply with a JSON object
//! `{"answer": ..., "mentioned_contexts": [...]}`, possibly wrapped in a
//! markdown code fence; models being models, the payload is frequently
//! malformed, partially filled, or plain prose. Parsing therefore reports
//! failure as a tagged result and never raises past this boundary.
//!
//! ## Input/Output Specification
//! - **Input**: Complete raw response text for one turn
//! - **Output**: [`ParsedResponse::Structured`] with answer + markers, or
//!   [`ParsedResponse::Plain`] carrying the raw text verbatim
//! - **Guarantees**: Deterministic, no side effects; invalid context entries
//!   are dropped with warning diagnostics, not hard failures

use crate::config::ParserConfig;
use crate::diagnostics::DiagnosticSink;
use crate::errors::{CitationError, Result};
use crate::utils::preview;
use regex::Regex;
use serde::Deserialize;

/// A model-declared pointer to the portion of retrieved text it used.
///
/// Two addressing modes exist, matching the two output schemas the model may
/// be prompted with: a literal quoted sentence, or start/end boundary words
/// with an optional 1-based reference number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CitationMarker {
    /// Raw quoted text from the source (`mentioned_contexts: [string]`)
    Quoted { text: String },
    /// Boundary words marking the cited span
    /// (`mentioned_contexts: [{reference, start, end}]`)
    Boundary {
        /// 1-based index into the reference list, when declared
        reference: Option<usize>,
        /// First 5-8 words of the cited passage
        start: String,
        /// Last 5-8 words of the cited passage
        end: String,
    },
}

/// Outcome of parsing one raw model response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedResponse {
    /// JSON parsed; markers may still be empty
    Structured {
        answer: String,
        markers: Vec<CitationMarker>,
    },
    /// JSON parsing failed entirely; the raw text is the answer
    Plain { raw: String },
}

#[derive(Debug, Deserialize)]
struct RawResponse {
    answer: Option<String>,
    #[serde(default)]
    mentioned_contexts: Vec<serde_json::Value>,
}

/// Parser for structured model responses
pub struct ResponseParser {
    config: ParserConfig,
    fence_regex: Regex,
    brace_regex: Regex,
}

impl ResponseParser {
    /// Create a new parser, compiling the extraction patterns
    pub fn new(config: ParserConfig) -> Result<Self> {
        let fence_regex = Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").map_err(|e| {
            CitationError::Internal {
                message: format!("Invalid fence regex: {}", e),
            }
        })?;
        let brace_regex =
            Regex::new(r"(?s)\{.*\}").map_err(|e| CitationError::Internal {
                message: format!("Invalid brace regex: {}", e),
            })?;

        Ok(Self {
            config,
            fence_regex,
            brace_regex,
        })
    }

    /// Parse a raw model response, degrading to plain text on failure.
    ///
    /// Dropped context entries are recorded on `sink`; the call itself cannot
    /// fail.
    pub fn parse(&self, raw: &str, sink: &mut DiagnosticSink) -> ParsedResponse {
        match self.try_parse(raw, sink) {
            Ok((answer, markers)) => ParsedResponse::Structured { answer, markers },
            Err(error) => {
                sink.warning(
                    "parser",
                    format!(
                        "falling back to plain answer: {} (input: '{}')",
                        error,
                        preview(raw, 60)
                    ),
                );
                ParsedResponse::Plain {
                    raw: raw.to_string(),
                }
            }
        }
    }

    fn try_parse(
        &self,
        raw: &str,
        sink: &mut DiagnosticSink,
    ) -> Result<(String, Vec<CitationMarker>)> {
        let json_str = self
            .extract_json(raw)
            .ok_or_else(|| CitationError::ResponseParse {
                details: "no JSON object found in response".to_string(),
            })?;

        let parsed: RawResponse =
            serde_json::from_str(json_str).map_err(|e| CitationError::ResponseParse {
                details: e.to_string(),
            })?;

        let answer = parsed.answer.unwrap_or_else(|| raw.to_string());

        let mut markers = Vec::new();
        for entry in &parsed.mentioned_contexts {
            match Self::normalize_entry(entry) {
                Some(marker) => markers.push(marker),
                None => sink.warning(
                    "parser",
                    format!(
                        "dropped malformed context entry: {}",
                        preview(&entry.to_string(), 80)
                    ),
                ),
            }
        }

        Ok((answer, markers))
    }

    /// Locate the JSON payload: fenced block first, then the outermost braces
    fn extract_json<'a>(&self, raw: &'a str) -> Option<&'a str> {
        if self.config.strip_code_fences {
            if let Some(captures) = self.fence_regex.captures(raw) {
                return captures.get(1).map(|m| m.as_str());
            }
        }
        self.brace_regex.find(raw).map(|m| m.as_str())
    }

    /// Normalize one `mentioned_contexts` entry into a marker
    fn normalize_entry(entry: &serde_json::Value) -> Option<CitationMarker> {
        match entry {
            serde_json::Value::String(text) => {
                let text = text.trim();
                if text.is_empty() {
                    return None;
                }
                Some(CitationMarker::Quoted {
                    text: text.to_string(),
                })
            }
            serde_json::Value::Object(object) => {
                let start = object.get("start")?.as_str()?.trim();
                let end = object.get("end")?.as_str()?.trim();
                if start.is_empty() || end.is_empty() {
                    return None;
                }
                let reference = object
                    .get("reference")
                    .and_then(|value| value.as_u64())
                    .map(|n| n as usize);
                Some(CitationMarker::Boundary {
                    reference,
                    start: start.to_string(),
                    end: end.to_string(),
                })
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Severity;

    fn parser() -> ResponseParser {
        ResponseParser::new(ParserConfig::default()).unwrap()
    }

    #[test]
    fn plain_fallback_on_non_json() {
        let mut sink = DiagnosticSink::new();
        let parsed = parser().parse("not json at all", &mut sink);
        assert_eq!(
            parsed,
            ParsedResponse::Plain {
                raw: "not json at all".to_string()
            }
        );
        assert!(!sink.is_empty());
    }

    #[test]
    fn parses_boundary_markers() {
        let raw = r#"{"answer":"Recursion requires a base case.","mentioned_contexts":[{"reference":1,"start":"The base case","end":"for stopping recursion"}]}"#;
        let mut sink = DiagnosticSink::new();
        let parsed = parser().parse(raw, &mut sink);
        match parsed {
            ParsedResponse::Structured { answer, markers } => {
                assert_eq!(answer, "Recursion requires a base case.");
                assert_eq!(
                    markers,
                    vec![CitationMarker::Boundary {
                        reference: Some(1),
                        start: "The base case".to_string(),
                        end: "for stopping recursion".to_string(),
                    }]
                );
            }
            other => panic!("expected structured response, got {:?}", other),
        }
        assert!(sink.is_empty());
    }

    #[test]
    fn parses_quoted_markers() {
        let raw = r#"{"answer":"ok","mentioned_contexts":["literal quoted sentence"]}"#;
        let mut sink = DiagnosticSink::new();
        match parser().parse(raw, &mut sink) {
            ParsedResponse::Structured { markers, .. } => {
                assert_eq!(
                    markers,
                    vec![CitationMarker::Quoted {
                        text: "literal quoted sentence".to_string()
                    }]
                );
            }
            other => panic!("expected structured response, got {:?}", other),
        }
    }

    #[test]
    fn extracts_json_from_code_fence() {
        let raw = "Here you go:\n```json\n{\"answer\":\"fenced\",\"mentioned_contexts\":[]}\n```\nthanks";
        let mut sink = DiagnosticSink::new();
        match parser().parse(raw, &mut sink) {
            ParsedResponse::Structured { answer, markers } => {
                assert_eq!(answer, "fenced");
                assert!(markers.is_empty());
            }
            other => panic!("expected structured response, got {:?}", other),
        }
    }

    #[test]
    fn drops_malformed_entries_with_warning() {
        let raw = r#"{"answer":"ok","mentioned_contexts":[{"start":"only start"},42,{"start":"a b c","end":"x y z"}]}"#;
        let mut sink = DiagnosticSink::new();
        match parser().parse(raw, &mut sink) {
            ParsedResponse::Structured { markers, .. } => {
                assert_eq!(markers.len(), 1);
            }
            other => panic!("expected structured response, got {:?}", other),
        }
        let entries = sink.into_entries();
        assert_eq!(entries.len(), 2);
        assert!(entries
            .iter()
            .all(|d| d.severity == Severity::Warning && d.stage == "parser"));
    }

    #[test]
    fn missing_answer_falls_back_to_raw() {
        let raw = r#"{"mentioned_contexts":[]}"#;
        let mut sink = DiagnosticSink::new();
        match parser().parse(raw, &mut sink) {
            ParsedResponse::Structured { answer, .. } => assert_eq!(answer, raw),
            other => panic!("expected structured response, got {:?}", other),
        }
    }

    #[test]
    fn parsing_is_deterministic() {
        let raw = r#"{"answer":"ok","mentioned_contexts":["x y z"]}"#;
        let mut sink_a = DiagnosticSink::new();
        let mut sink_b = DiagnosticSink::new();
        let parser = parser();
        assert_eq!(parser.parse(raw, &mut sink_a), parser.parse(raw, &mut sink_b));
    }
}
