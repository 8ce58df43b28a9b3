//! Error types for the Bayes point machine workspace.
//!
//! This module provides structured error handling with:
//! - Stable error codes for machine parsing
//! - Category classification for error grouping
//! - Recoverability hints for automation
//! - Remediation suggestions for humans
//!
//! # Agent-Facing Output
//!
//! Errors serialize to structured JSON:
//! ```json
//! {
//!   "code": 20,
//!   "category": "input",
//!   "message": "invalid item: feature index 7 out of range for 4 features",
//!   "recoverable": true,
//!   "context": { "index": 7, "feature_count": 4 }
//! }
//! ```

use bpm_math::BeliefError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Result type alias for Bayes point machine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Model configuration errors.
    Config,
    /// Malformed items, labels, or batches.
    Input,
    /// Approximate inference and numerical errors.
    Inference,
    /// Chunk bookkeeping errors.
    Chunking,
    /// File I/O and serialization errors.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Input => write!(f, "input"),
            ErrorCategory::Inference => write!(f, "inference"),
            ErrorCategory::Chunking => write!(f, "chunking"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Ways an item or label can disagree with the model's dimensions.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DimensionError {
    #[error("feature index {index} out of range for {feature_count} features")]
    IndexOutOfRange { index: usize, feature_count: usize },

    #[error("sparse item has {indices} indices but {values} values")]
    LengthMismatch { indices: usize, values: usize },

    #[error("feature index {index} appears more than once")]
    DuplicateIndex { index: usize },

    #[error("dense item has {actual} values, expected {expected}")]
    DenseLengthMismatch { expected: usize, actual: usize },

    #[error("value at position {position} is not finite")]
    NonFiniteValue { position: usize },

    #[error("label {label} out of range for {class_count} classes")]
    LabelOutOfRange { label: usize, class_count: usize },
}

/// Unified error type for the workspace.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // Input errors (20-29)
    #[error("invalid item: {0}")]
    InvalidDimension(#[from] DimensionError),

    #[error("expected {expected} classes, got {actual}")]
    ClassCountMismatch { expected: usize, actual: usize },

    // Inference errors (30-39)
    #[error("inference diverged in {context}: precision {precision:.6e}")]
    InferenceDivergence { context: String, precision: f64 },

    #[error("belief arithmetic failed: {0}")]
    Belief(#[from] BeliefError),

    // Chunking errors (40-49)
    #[error("chunk index {index} out of range for {chunk_count} chunks")]
    ChunkIndexOutOfRange { index: usize, chunk_count: usize },

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Returns the error code for this error type.
    ///
    /// Error codes are stable and grouped by category:
    /// - 10-19: Configuration errors
    /// - 20-29: Input errors
    /// - 30-39: Inference errors
    /// - 40-49: Chunking errors
    /// - 60-69: I/O errors
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::InvalidConfig(_) => 11,
            Error::InvalidDimension(_) => 20,
            Error::ClassCountMismatch { .. } => 21,
            Error::InferenceDivergence { .. } => 30,
            Error::Belief(_) => 31,
            Error::ChunkIndexOutOfRange { .. } => 40,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
            Error::Toml(_) => 62,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) | Error::InvalidConfig(_) => ErrorCategory::Config,
            Error::InvalidDimension(_) | Error::ClassCountMismatch { .. } => ErrorCategory::Input,
            Error::InferenceDivergence { .. } | Error::Belief(_) => ErrorCategory::Inference,
            Error::ChunkIndexOutOfRange { .. } => ErrorCategory::Chunking,
            Error::Io(_) | Error::Json(_) | Error::Toml(_) => ErrorCategory::Io,
        }
    }

    /// Returns whether this error is potentially recoverable.
    ///
    /// None of these errors leave a model partially updated, so every input
    /// or configuration error can be retried with corrected data.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Config(_) | Error::InvalidConfig(_) => true,
            Error::InvalidDimension(_) => true,
            Error::ClassCountMismatch { .. } => false, // model shape is fixed
            Error::InferenceDivergence { .. } => true, // retry under a clamping policy
            Error::Belief(_) => false,
            Error::ChunkIndexOutOfRange { .. } => true,
            Error::Io(_) => true,
            Error::Json(_) | Error::Toml(_) => true,
        }
    }

    /// Returns a human-readable remediation hint.
    pub fn remediation(&self) -> &'static str {
        match self {
            Error::Config(_) => "Check the config path and file syntax.",
            Error::InvalidConfig(_) => {
                "Fix the reported field; class_count >= 2, feature_count >= 1 and noise_precision > 0 are required."
            }
            Error::InvalidDimension(_) => {
                "Ensure sparse indices are unique and below the feature count, values are finite, and labels name a class."
            }
            Error::ClassCountMismatch { .. } => {
                "Build the model with the class count of the data, or regroup the data."
            }
            Error::InferenceDivergence { .. } => {
                "Use the clamp divergence policy or lower the noise precision."
            }
            Error::Belief(_) => "Internal numerical issue in belief arithmetic.",
            Error::ChunkIndexOutOfRange { .. } => {
                "Use chunk indices below the configured chunk count."
            }
            Error::Io(_) => "Check that the file exists and is readable.",
            Error::Json(_) => "Invalid JSON. Check the file syntax.",
            Error::Toml(_) => "Invalid TOML. Check the file syntax.",
        }
    }

    /// Returns a short headline for human-readable output.
    pub fn headline(&self) -> &'static str {
        match self {
            Error::Config(_) => "Configuration Error",
            Error::InvalidConfig(_) => "Invalid Configuration",
            Error::InvalidDimension(_) => "Invalid Item",
            Error::ClassCountMismatch { .. } => "Class Count Mismatch",
            Error::InferenceDivergence { .. } => "Inference Diverged",
            Error::Belief(_) => "Belief Arithmetic Error",
            Error::ChunkIndexOutOfRange { .. } => "Chunk Index Out of Range",
            Error::Io(_) => "I/O Error",
            Error::Json(_) => "JSON Parse Error",
            Error::Toml(_) => "TOML Parse Error",
        }
    }
}

/// Structured error response for JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// Stable error code.
    pub code: u32,

    /// Error category for grouping.
    pub category: ErrorCategory,

    /// Human-readable error message.
    pub message: String,

    /// Whether the error is potentially recoverable.
    pub recoverable: bool,

    /// Additional structured context (e.g., index, chunk).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,
}

impl From<&Error> for StructuredError {
    fn from(err: &Error) -> Self {
        let mut context = HashMap::new();

        match err {
            Error::InvalidDimension(DimensionError::IndexOutOfRange {
                index,
                feature_count,
            }) => {
                context.insert("index".to_string(), serde_json::json!(index));
                context.insert("feature_count".to_string(), serde_json::json!(feature_count));
            }
            Error::InvalidDimension(DimensionError::LabelOutOfRange { label, class_count }) => {
                context.insert("label".to_string(), serde_json::json!(label));
                context.insert("class_count".to_string(), serde_json::json!(class_count));
            }
            Error::ClassCountMismatch { expected, actual } => {
                context.insert("expected".to_string(), serde_json::json!(expected));
                context.insert("actual".to_string(), serde_json::json!(actual));
            }
            Error::InferenceDivergence { context: at, precision } => {
                context.insert("at".to_string(), serde_json::json!(at));
                context.insert("precision".to_string(), serde_json::json!(precision));
            }
            Error::ChunkIndexOutOfRange { index, chunk_count } => {
                context.insert("chunk_index".to_string(), serde_json::json!(index));
                context.insert("chunk_count".to_string(), serde_json::json!(chunk_count));
            }
            _ => {}
        }

        StructuredError {
            code: err.code(),
            category: err.category(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
            context,
        }
    }
}

impl StructuredError {
    /// Add additional context to the error.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"code":{},"error":"serialization_failed"}}"#, self.code)
        })
    }
}

/// Format an error for human-readable stderr output.
///
/// Output format:
/// ```text
/// ✗ [Headline]
///   Reason: [Error message]
///   Fix: [Remediation hint]
/// ```
pub fn format_error_human(err: &Error) -> String {
    format!(
        "✗ {}\n  Reason: {}\n  Fix: {}",
        err.headline(),
        err,
        err.remediation()
    )
}
