//! Configuration loading for model construction.
//!
//! Wraps `bpm-config` resolution with error reporting, preset fallback, and
//! a loaded-config event.

use std::path::PathBuf;
use thiserror::Error;

pub use bpm_config::{
    get_preset, list_presets, resolve_config_path, validate_model_config, ChunkingConfig,
    ConfigSnapshot, ConfigSource, DivergenceConfig, DivergencePolicy, ModelConfig, PresetName,
    PriorConfig, ResolvedConfigPath, ScheduleConfig, TrainingMode, ValidationError,
    WeightRepresentation,
};

use crate::logging::{event_names, LogContext, Stage};

/// Configuration loading errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Failed to load {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: ValidationError,
    },

    #[error("Semantic validation failed: {0}")]
    Validation(#[from] ValidationError),
}

impl From<ConfigError> for bpm_common::Error {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NotFound { .. } | ConfigError::Load { .. } => {
                bpm_common::Error::Config(err.to_string())
            }
            ConfigError::Validation(inner) => bpm_common::Error::InvalidConfig(inner.to_string()),
        }
    }
}

/// Caller-supplied loading options.
#[derive(Debug, Clone, Default)]
pub struct ConfigOptions {
    /// Explicit config file; must exist when given.
    pub config_path: Option<PathBuf>,
    /// Preset used when no file is found.
    pub preset: Option<PresetName>,
}

/// Loaded configuration with provenance information.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: ModelConfig,
    pub resolved: ResolvedConfigPath,
    /// Preset the configuration came from, if no file was used.
    pub preset: Option<PresetName>,
}

impl ResolvedConfig {
    /// Snapshot for run telemetry.
    pub fn snapshot(&self) -> ConfigSnapshot {
        ConfigSnapshot::new(&self.config, &self.resolved)
    }
}

/// Load and validate a model configuration.
///
/// Resolution order (highest to lowest priority):
/// 1. `options.config_path` (an error if it does not exist)
/// 2. `BPM_CONFIG`, `BPM_CONFIG_DIR`, XDG config directory
/// 3. `options.preset`
/// 4. `ModelConfig::default()`
pub fn load_config(options: &ConfigOptions) -> Result<ResolvedConfig, ConfigError> {
    if let Some(path) = &options.config_path {
        if !path.exists() {
            return Err(ConfigError::NotFound { path: path.clone() });
        }
    }

    let resolved = resolve_config_path(options.config_path.as_deref());
    let (config, preset) = match &resolved.path {
        Some(path) => {
            let config = ModelConfig::from_file(path).map_err(|source| ConfigError::Load {
                path: path.clone(),
                source,
            })?;
            (config, None)
        }
        None => match options.preset {
            Some(name) => (get_preset(name), Some(name)),
            None => (ModelConfig::default(), None),
        },
    };

    validate_model_config(&config)?;

    let loaded = ResolvedConfig {
        config,
        resolved,
        preset,
    };
    let snapshot = loaded.snapshot();
    let ctx = LogContext::default();
    let source = loaded.resolved.source.to_string();
    if loaded.resolved.path.is_some() {
        crate::log_event!(
            ctx,
            INFO,
            event_names::CONFIG_LOADED,
            Stage::Init,
            "model configuration loaded",
            source = source.as_str(),
            config_hash = snapshot.short_id()
        );
    } else {
        crate::log_event!(
            ctx,
            INFO,
            event_names::CONFIG_DEFAULT_USED,
            Stage::Init,
            "no config file found, using built-in configuration",
            preset = preset.map(|p| p.as_str()).unwrap_or("default"),
            config_hash = snapshot.short_id()
        );
    }
    Ok(loaded)
}
