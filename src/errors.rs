//! # Error Handling Module
//!
//! ## Purpose
//! Centralized error handling for the citation matching engine. Only
//! programming-contract violations (corrupt index blobs, bad configuration,
//! I/O failures in the CLI layer) surface as errors; data-quality problems
//! (unparseable model output, missing sentence mappings, low-confidence
//! matches) degrade the output shape and are reported through
//! [`crate::diagnostics`] instead.
//!
//! ## Input/Output Specification
//! - **Input**: Failure conditions from parsing, index loading, config, I/O
//! - **Output**: Structured error types with context and error chains
//! - **Error Categories**: Parser, Index, Configuration, Serialization, I/O

use thiserror::Error;

/// Result type used throughout the application
pub type Result<T> = std::result::Result<T, CitationError>;

/// Error types for the citation matching engine
#[derive(Debug, Error)]
pub enum CitationError {
    /// Model output could not be parsed as a structured response.
    ///
    /// This never escapes the pipeline boundary: the pipeline converts it
    /// into the PLAIN fallback. It exists as a typed error so the parser's
    /// contract is explicit.
    #[error("Failed to parse structured response: {details}")]
    ResponseParse { details: String },

    /// Sentence-mapping blob is structurally corrupt (not merely absent)
    #[error("Invalid sentence index for file '{file_uuid}': {details}")]
    InvalidIndex { file_uuid: String, details: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Validation errors
    #[error("Validation failed for field '{field}': {reason}")]
    ValidationFailed { field: String, reason: String },

    /// Internal system errors
    #[error("Internal error: {message}")]
    Internal { message: String },

    /// Generic I/O errors (CLI layer only)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing errors (CLI layer only; the parser handles its own)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl CitationError {
    /// Get error category for metrics and logging
    pub fn category(&self) -> &'static str {
        match self {
            CitationError::ResponseParse { .. } => "parser",
            CitationError::InvalidIndex { .. } => "index",
            CitationError::Config { .. } | CitationError::ValidationFailed { .. } => {
                "configuration"
            }
            CitationError::Json(_) | CitationError::Toml(_) => "serialization",
            CitationError::Io(_) => "io",
            CitationError::Internal { .. } => "generic",
        }
    }

    /// Whether the condition is recoverable by degrading the response
    /// instead of failing the request.
    pub fn is_degradable(&self) -> bool {
        matches!(self, CitationError::ResponseParse { .. })
    }
}
