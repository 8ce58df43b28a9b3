//! Configuration validation errors and semantic validation.

use thiserror::Error;

use crate::model::{ModelConfig, TrainingMode};

/// Validation result type.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Configuration validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Semantic validation failed: {0}")]
    SemanticError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },
}

impl ValidationError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ValidationError::IoError(_) => 60,
            ValidationError::ParseError(_) => 61,
            ValidationError::SemanticError(_) => 63,
            ValidationError::InvalidValue { .. } => 65,
            ValidationError::VersionMismatch { .. } => 66,
        }
    }
}

fn invalid(field: &str, message: String) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.to_string(),
        message,
    }
}

fn require_positive_finite(field: &str, value: f64) -> ValidationResult<()> {
    if !(value > 0.0) || !value.is_finite() {
        return Err(invalid(field, format!("Must be positive and finite, got {}", value)));
    }
    Ok(())
}

/// Validate a model configuration semantically.
pub fn validate_model_config(config: &ModelConfig) -> ValidationResult<()> {
    if config.schema_version != crate::CONFIG_SCHEMA_VERSION {
        return Err(ValidationError::VersionMismatch {
            expected: crate::CONFIG_SCHEMA_VERSION.to_string(),
            actual: config.schema_version.clone(),
        });
    }

    if config.class_count < 2 {
        return Err(invalid(
            "class_count",
            format!("Must be at least 2, got {}", config.class_count),
        ));
    }

    if config.feature_count < 1 {
        return Err(invalid("feature_count", "Must be at least 1, got 0".to_string()));
    }

    require_positive_finite("noise_precision", config.noise_precision)?;

    if config.anchor_class >= config.class_count {
        return Err(invalid(
            "anchor_class",
            format!(
                "Must be below class_count ({}), got {}",
                config.class_count, config.anchor_class
            ),
        ));
    }

    if !config.prior.mean.is_finite() {
        return Err(invalid("prior.mean", format!("Must be finite, got {}", config.prior.mean)));
    }
    require_positive_finite("prior.precision", config.prior.precision)?;

    if config.schedule.sweeps == 0 {
        return Err(invalid("schedule.sweeps", "Must be at least 1".to_string()));
    }
    if config.schedule.passes == 0 {
        return Err(invalid("schedule.passes", "Must be at least 1".to_string()));
    }

    require_positive_finite("divergence.precision_floor", config.divergence.precision_floor)?;

    if !config.value_to_ignore.is_finite() {
        return Err(invalid(
            "value_to_ignore",
            format!("Must be finite, got {}", config.value_to_ignore),
        ));
    }

    if let Some(chunking) = &config.chunking {
        if chunking.max_items_per_chunk == 0 {
            return Err(invalid(
                "chunking.max_items_per_chunk",
                "Must be at least 1".to_string(),
            ));
        }
        if chunking.chunk_count == Some(0) {
            return Err(invalid("chunking.chunk_count", "Must be at least 1".to_string()));
        }
    }

    if config.mode == TrainingMode::Shared && config.chunking.is_none() {
        return Err(ValidationError::SemanticError(
            "mode = \"shared\" requires a [chunking] section".to_string(),
        ));
    }

    Ok(())
}
