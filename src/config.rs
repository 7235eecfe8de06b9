//! # Configuration Management Module
//!
//! ## Purpose
//! Centralized configuration for the citation matching engine, supporting TOML
//! files and environment-variable overrides with validation and type-safe
//! access to all settings.
//!
//! ## Input/Output Specification
//! - **Input**: Configuration files (TOML), environment variables
//! - **Output**: Validated configuration structs with defaults and overrides
//! - **Validation**: Range checks on thresholds and limits
//!
//! ## Configuration Sources (in order of precedence)
//! 1. Environment variables (highest priority)
//! 2. Configuration files
//! 3. Default values (lowest priority)
//!
//! ## Usage
//! ```rust,no_run
//! use citation_anchor::config::Config;
//!
//! let config = Config::from_file("config.toml").unwrap();
//! println!("threshold: {}", config.matching.similarity_threshold);
//! ```

use crate::errors::{CitationError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure containing all engine settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Context matching behavior
    pub matching: MatchingConfig,
    /// Structured-response parsing behavior
    pub parser: ParserConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Context matching configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Minimum similarity for accepting a fuzzy match (inclusive).
    ///
    /// The policy constant observed in production is 0.85; it is exposed here
    /// so deployments can tune it, but the default must stay at 0.85.
    pub similarity_threshold: f64,
    /// Maximum citation markers processed per response; excess markers are
    /// dropped with a warning to keep per-request cost bounded
    pub max_markers_per_response: usize,
    /// Minimum marker text length in characters; shorter fragments are noise
    /// and would match almost anything
    pub min_marker_chars: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.85,
            max_markers_per_response: 32,
            min_marker_chars: 3,
        }
    }
}

/// Structured-response parsing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Look inside markdown code fences for the JSON payload before trying
    /// the raw text
    pub strip_code_fences: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            strip_code_fences: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Enable structured JSON logging
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        Self::from_file("config.toml")
    }

    /// Load configuration from a specific file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::warn!("Configuration file not found: {:?}, using defaults", path);
            let mut config = Self::default();
            config.apply_env_overrides()?;
            config.validate()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path).map_err(|e| CitationError::Config {
            message: format!("Failed to read config file {:?}: {}", path, e),
        })?;

        let mut config: Config = toml::from_str(&content).map_err(|e| CitationError::Config {
            message: format!("Failed to parse config file {:?}: {}", path, e),
        })?;

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(level) = std::env::var("CITATION_ANCHOR_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(threshold) = std::env::var("CITATION_ANCHOR_SIMILARITY_THRESHOLD") {
            self.matching.similarity_threshold =
                threshold.parse().map_err(|_| CitationError::Config {
                    message: "Invalid value in CITATION_ANCHOR_SIMILARITY_THRESHOLD".to_string(),
                })?;
        }
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let threshold = self.matching.similarity_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(CitationError::ValidationFailed {
                field: "matching.similarity_threshold".to_string(),
                reason: format!("must be in (0.0, 1.0], got {}", threshold),
            });
        }

        if self.matching.max_markers_per_response == 0 {
            return Err(CitationError::ValidationFailed {
                field: "matching.max_markers_per_response".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        if self.matching.min_marker_chars == 0 {
            return Err(CitationError::ValidationFailed {
                field: "matching.min_marker_chars".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(())
    }

    /// Get configuration as TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| CitationError::Config {
            message: format!("Failed to serialize config to TOML: {}", e),
        })
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = self.to_toml()?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_observed_policy() {
        let config = Config::default();
        assert_eq!(config.matching.similarity_threshold, 0.85);
        assert_eq!(config.matching.max_markers_per_response, 32);
        assert!(config.parser.strip_code_fences);
        config.validate().unwrap();
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let mut config = Config::default();
        config.matching.similarity_threshold = 1.5;
        assert!(config.validate().is_err());
        config.matching.similarity_threshold = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn loads_partial_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[matching]\nsimilarity_threshold = 0.9").unwrap();
        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.matching.similarity_threshold, 0.9);
        // Unspecified sections keep their defaults
        assert_eq!(config.matching.min_marker_chars, 3);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn toml_round_trip() {
        let config = Config::default();
        let serialized = config.to_toml().unwrap();
        let reparsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(
            reparsed.matching.similarity_threshold,
            config.matching.similarity_threshold
        );
    }
}
