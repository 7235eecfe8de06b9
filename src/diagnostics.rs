//! # Diagnostics Module
//!
//! ## Purpose
//! Non-fatal, request-scoped diagnostics accumulated while processing one
//! model response. Matching degrades rather than fails on bad data, so the
//! interesting conditions (dropped markers, unresolved reference numbers,
//! files without sentence mappings, low-confidence rejections) are returned
//! alongside the primary output instead of being written to a shared log
//! stream. Callers decide whether to surface, count, or ignore them.
//!
//! ## Input/Output Specification
//! - **Input**: Degradation events from parser, matcher, and enhancer
//! - **Output**: Ordered list of [`Diagnostic`] values on the final result

use serde::{Deserialize, Serialize};

/// Severity of a non-fatal diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Expected degradation (e.g. non-PDF file without a sentence mapping)
    Info,
    /// Data-quality problem worth surfacing (e.g. dropped citation marker)
    Warning,
}

/// A single non-fatal diagnostic emitted during citation processing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// Severity level
    pub severity: Severity,
    /// Pipeline stage that emitted the diagnostic (parser, matcher, enhancer)
    pub stage: &'static str,
    /// Human-readable description of the condition
    pub message: String,
}

impl Diagnostic {
    pub fn info(stage: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            stage,
            message: message.into(),
        }
    }

    pub fn warning(stage: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            stage,
            message: message.into(),
        }
    }
}

/// Accumulator for diagnostics raised during one request
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    entries: Vec<Diagnostic>,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic and mirror it to the tracing layer
    pub fn push(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Info => {
                tracing::debug!(stage = diagnostic.stage, "{}", diagnostic.message)
            }
            Severity::Warning => {
                tracing::warn!(stage = diagnostic.stage, "{}", diagnostic.message)
            }
        }
        self.entries.push(diagnostic);
    }

    pub fn info(&mut self, stage: &'static str, message: impl Into<String>) {
        self.push(Diagnostic::info(stage, message));
    }

    pub fn warning(&mut self, stage: &'static str, message: impl Into<String>) {
        self.push(Diagnostic::warning(stage, message));
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Consume the sink, yielding the ordered diagnostics
    pub fn into_entries(self) -> Vec<Diagnostic> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_preserves_order() {
        let mut sink = DiagnosticSink::new();
        sink.warning("parser", "dropped context entry");
        sink.info("matcher", "no sentence mapping for file f2");
        let entries = sink.into_entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].severity, Severity::Warning);
        assert_eq!(entries[0].stage, "parser");
        assert_eq!(entries[1].severity, Severity::Info);
    }
}
