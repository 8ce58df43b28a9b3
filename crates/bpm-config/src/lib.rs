//! Bayes point machine configuration loading and validation.
//!
//! This crate provides:
//! - Typed Rust structs for model configuration files (JSON or TOML)
//! - Config resolution (explicit path → env → XDG → defaults)
//! - Semantic validation
//! - Presets reproducing the reference training setups
//! - Config snapshots for run telemetry

pub mod model;
pub mod preset;
pub mod resolve;
pub mod snapshot;
pub mod validate;

pub use model::{
    ChunkingConfig, DivergenceConfig, DivergencePolicy, ModelConfig, PriorConfig, ScheduleConfig,
    TrainingMode, WeightRepresentation,
};
pub use preset::{get_preset, list_presets, PresetName};
pub use resolve::{resolve_config_path, ConfigSource, ResolvedConfigPath};
pub use snapshot::ConfigSnapshot;
pub use validate::{validate_model_config, ValidationError, ValidationResult};

/// Schema version for configuration files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";
