//! Configuration presets reproducing the reference training setups.
//!
//! All presets use three classes, four features, and noise precision 0.1:
//! - Batch: dense weights, one call over the whole data set
//! - Incremental: dense weights, chunks of ten folded in one after another
//! - Shared: dense weights, chunks of ten combined over 15 passes
//! - Sparse: factorized weights, one call over the whole data set
//! - SparseShared: factorized weights, chunks of ten combined over 5 passes
//!
//! The shared presets run several EP sweeps on every chunk visit so each
//! chunk's contribution is close to its fixed point before it is combined.
//! With a single sweep different chunkings settle on visibly different
//! weights.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::{ModelConfig, TrainingMode, WeightRepresentation};

/// Available configuration presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresetName {
    Batch,
    Incremental,
    Shared,
    Sparse,
    SparseShared,
}

impl PresetName {
    /// All available preset names.
    pub const ALL: &'static [PresetName] = &[
        PresetName::Batch,
        PresetName::Incremental,
        PresetName::Shared,
        PresetName::Sparse,
        PresetName::SparseShared,
    ];

    /// Get preset name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PresetName::Batch => "batch",
            PresetName::Incremental => "incremental",
            PresetName::Shared => "shared",
            PresetName::Sparse => "sparse",
            PresetName::SparseShared => "sparse_shared",
        }
    }

    /// Parse preset name from string.
    pub fn parse(s: &str) -> Option<PresetName> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "batch" | "dense" => Some(PresetName::Batch),
            "incremental" | "online" => Some(PresetName::Incremental),
            "shared" | "chunked" => Some(PresetName::Shared),
            "sparse" | "factorized" => Some(PresetName::Sparse),
            "sparse_shared" | "sparse_chunked" => Some(PresetName::SparseShared),
            _ => None,
        }
    }

    /// Get a description of the preset.
    pub fn description(&self) -> &'static str {
        match self {
            PresetName::Batch => "Dense weights trained in one call from canonical priors",
            PresetName::Incremental => {
                "Dense weights, each chunk's posterior becomes the next chunk's prior"
            }
            PresetName::Shared => "Dense weights, chunk contributions combined over 15 passes",
            PresetName::Sparse => "Factorized weights for sparse items, trained in one call",
            PresetName::SparseShared => {
                "Factorized weights, chunk contributions combined over 5 passes"
            }
        }
    }
}

impl fmt::Display for PresetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PresetName {
    type Err = PresetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PresetName::parse(s).ok_or_else(|| PresetError::UnknownPreset(s.to_string()))
    }
}

/// Errors related to preset operations.
#[derive(Debug, Clone, PartialEq)]
pub enum PresetError {
    /// Unknown preset name.
    UnknownPreset(String),
}

impl fmt::Display for PresetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PresetError::UnknownPreset(name) => {
                write!(
                    f,
                    "Unknown preset '{}'. Available: {}",
                    name,
                    PresetName::ALL
                        .iter()
                        .map(|p| p.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            }
        }
    }
}

impl std::error::Error for PresetError {}

/// Name and description of a preset, for listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresetInfo {
    pub name: PresetName,
    pub description: String,
}

/// List every preset with its description.
pub fn list_presets() -> Vec<PresetInfo> {
    PresetName::ALL
        .iter()
        .map(|name| PresetInfo {
            name: *name,
            description: name.description().to_string(),
        })
        .collect()
}

const SAMPLE_CLASSES: usize = 3;
const SAMPLE_FEATURES: usize = 4;
const SAMPLE_NOISE_PRECISION: f64 = 0.1;
const SAMPLE_CHUNK_SIZE: usize = 10;
const SHARED_CHUNK_SWEEPS: usize = 10;

/// Get the configuration for a preset.
pub fn get_preset(name: PresetName) -> ModelConfig {
    let base = ModelConfig::new(SAMPLE_CLASSES, SAMPLE_FEATURES)
        .with_noise_precision(SAMPLE_NOISE_PRECISION);
    let mut config = match name {
        PresetName::Batch => base.with_mode(TrainingMode::Batch),
        PresetName::Incremental => base
            .with_mode(TrainingMode::Incremental)
            .with_chunking(SAMPLE_CHUNK_SIZE, None),
        PresetName::Shared => base
            .with_mode(TrainingMode::Shared)
            .with_chunking(SAMPLE_CHUNK_SIZE, None)
            .with_sweeps(SHARED_CHUNK_SWEEPS)
            .with_passes(15),
        PresetName::Sparse => base
            .with_mode(TrainingMode::Batch)
            .with_representation(WeightRepresentation::Factorized),
        PresetName::SparseShared => base
            .with_mode(TrainingMode::Shared)
            .with_representation(WeightRepresentation::Factorized)
            .with_chunking(SAMPLE_CHUNK_SIZE, None)
            .with_sweeps(SHARED_CHUNK_SWEEPS)
            .with_passes(5),
    };
    config.description = Some(format!("preset:{}", name.as_str()));
    config
}
