//! Model configuration types.
//!
//! Every field except the two dimensions has a default, so a minimal file
//! only needs `class_count` and `feature_count`.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::validate::{ValidationError, ValidationResult};

/// How each class's weight belief is represented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum WeightRepresentation {
    /// One multivariate Gaussian with a full precision matrix per class.
    #[default]
    Dense,
    /// Independent scalar Gaussians per feature (the sparse model).
    #[serde(alias = "sparse")]
    Factorized,
}

impl WeightRepresentation {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeightRepresentation::Dense => "dense",
            WeightRepresentation::Factorized => "factorized",
        }
    }
}

/// Which training driver a configuration is meant for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TrainingMode {
    /// Canonical priors, one call over the whole data set.
    #[default]
    Batch,
    /// Each call's posterior is the next call's prior.
    Incremental,
    /// Chunk contributions combined into one shared posterior over passes.
    Shared,
}

impl TrainingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrainingMode::Batch => "batch",
            TrainingMode::Incremental => "incremental",
            TrainingMode::Shared => "shared",
        }
    }
}

/// What to do when an update would leave a belief with non-positive precision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DivergencePolicy {
    /// Replace the message by one with the floor precision at the tilted mean.
    #[default]
    Clamp,
    /// Drop the offending update and keep going.
    Skip,
    /// Abort the call; no belief is modified.
    Fail,
}

/// Gaussian prior shared by every non-anchor weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct PriorConfig {
    pub mean: f64,
    pub precision: f64,
}

impl Default for PriorConfig {
    fn default() -> Self {
        Self {
            mean: 0.0,
            precision: 1.0,
        }
    }
}

/// Message-passing schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Passes over the items within one training call.
    pub sweeps: usize,
    /// Passes over all chunks in shared training.
    pub passes: usize,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            sweeps: 1,
            passes: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct DivergenceConfig {
    pub policy: DivergencePolicy,
    /// Precision given to clamped messages.
    pub precision_floor: f64,
}

impl Default for DivergenceConfig {
    fn default() -> Self {
        Self {
            policy: DivergencePolicy::Clamp,
            precision_floor: 1e-10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Largest number of items in one chunk.
    pub max_items_per_chunk: usize,
    /// Upper bound on chunk indices; `None` accepts any index.
    pub chunk_count: Option<usize>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_items_per_chunk: 10,
            chunk_count: None,
        }
    }
}

fn default_schema_version() -> String {
    crate::CONFIG_SCHEMA_VERSION.to_string()
}

fn default_noise_precision() -> f64 {
    0.1
}

/// Complete model configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ModelConfig {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Number of classes K (at least 2).
    pub class_count: usize,

    /// Number of features F (at least 1).
    pub feature_count: usize,

    /// Precision of the Gaussian noise added to every class score.
    #[serde(default = "default_noise_precision")]
    pub noise_precision: f64,

    /// Class whose weights are pinned to zero for identifiability.
    #[serde(default)]
    pub anchor_class: usize,

    #[serde(default)]
    pub representation: WeightRepresentation,

    #[serde(default)]
    pub mode: TrainingMode,

    #[serde(default)]
    pub prior: PriorConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(default)]
    pub divergence: DivergenceConfig,

    #[serde(default)]
    pub chunking: Option<ChunkingConfig>,

    /// Dense feature value dropped when sparsifying input.
    #[serde(default)]
    pub value_to_ignore: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::new(3, 4)
    }
}

impl ModelConfig {
    /// Defaults for the given dimensions.
    pub fn new(class_count: usize, feature_count: usize) -> Self {
        Self {
            schema_version: default_schema_version(),
            description: None,
            class_count,
            feature_count,
            noise_precision: default_noise_precision(),
            anchor_class: 0,
            representation: WeightRepresentation::Dense,
            mode: TrainingMode::Batch,
            prior: PriorConfig::default(),
            schedule: ScheduleConfig::default(),
            divergence: DivergenceConfig::default(),
            chunking: None,
            value_to_ignore: 0.0,
        }
    }

    pub fn with_noise_precision(mut self, noise_precision: f64) -> Self {
        self.noise_precision = noise_precision;
        self
    }

    pub fn with_representation(mut self, representation: WeightRepresentation) -> Self {
        self.representation = representation;
        self
    }

    pub fn with_mode(mut self, mode: TrainingMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_prior(mut self, mean: f64, precision: f64) -> Self {
        self.prior = PriorConfig { mean, precision };
        self
    }

    pub fn with_sweeps(mut self, sweeps: usize) -> Self {
        self.schedule.sweeps = sweeps;
        self
    }

    pub fn with_passes(mut self, passes: usize) -> Self {
        self.schedule.passes = passes;
        self
    }

    pub fn with_divergence(mut self, policy: DivergencePolicy, precision_floor: f64) -> Self {
        self.divergence = DivergenceConfig {
            policy,
            precision_floor,
        };
        self
    }

    pub fn with_chunking(mut self, max_items_per_chunk: usize, chunk_count: Option<usize>) -> Self {
        self.chunking = Some(ChunkingConfig {
            max_items_per_chunk,
            chunk_count,
        });
        self
    }

    /// Variance of the score noise.
    pub fn noise_variance(&self) -> f64 {
        1.0 / self.noise_precision
    }

    /// Load configuration from a file; `.toml` files parse as TOML, anything
    /// else as JSON.
    pub fn from_file(path: &std::path::Path) -> ValidationResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ValidationError::IoError(format!("Failed to read {}: {}", path.display(), e))
        })?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&content),
            _ => Self::from_json_str(&content),
        }
    }

    /// Parse configuration from a JSON string.
    pub fn from_json_str(json: &str) -> ValidationResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| ValidationError::ParseError(format!("Invalid JSON: {}", e)))
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(text: &str) -> ValidationResult<Self> {
        toml::from_str(text).map_err(|e| ValidationError::ParseError(format!("Invalid TOML: {}", e)))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// JSON schema for configuration files.
    pub fn json_schema() -> serde_json::Value {
        serde_json::to_value(schemars::schema_for!(ModelConfig)).unwrap_or(serde_json::Value::Null)
    }
}
