//! Configuration snapshots for run telemetry and reproducibility.
//!
//! A snapshot captures the exact configuration a model was trained with, so
//! two runs can be compared by hash alone.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::model::ModelConfig;
use crate::resolve::{ConfigSource, ResolvedConfigPath};

/// A frozen snapshot of configuration state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    /// When this snapshot was taken.
    pub timestamp: DateTime<Utc>,

    /// Schema version of the configuration.
    pub schema_version: String,

    /// Path the configuration was loaded from.
    #[serde(default)]
    pub config_path: Option<String>,

    /// Source of the configuration.
    pub source: String,

    /// SHA-256 of the canonical JSON form of the configuration.
    pub config_hash: String,

    /// Key configuration values for quick reference.
    pub summary: ConfigSummary,
}

/// Summary of key configuration values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSummary {
    pub class_count: usize,
    pub feature_count: usize,
    pub noise_precision: f64,
    pub representation: String,
    pub mode: String,
    pub sweeps: usize,
    pub divergence_policy: String,
}

impl ConfigSnapshot {
    /// Create a new snapshot from a loaded configuration.
    pub fn new(config: &ModelConfig, resolved: &ResolvedConfigPath) -> Self {
        ConfigSnapshot {
            timestamp: Utc::now(),
            schema_version: config.schema_version.clone(),
            config_path: resolved.path.as_ref().map(|p| p.display().to_string()),
            source: resolved.source.to_string(),
            config_hash: hash_config(config),
            summary: ConfigSummary::from_config(config),
        }
    }

    /// Snapshot of a configuration built in code rather than loaded.
    pub fn from_config(config: &ModelConfig) -> Self {
        Self::new(
            config,
            &ResolvedConfigPath {
                path: None,
                source: ConfigSource::Explicit,
            },
        )
    }

    /// Serialize snapshot to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize snapshot from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Check if this snapshot matches another (same config).
    pub fn matches(&self, other: &ConfigSnapshot) -> bool {
        self.config_hash == other.config_hash
    }

    /// Get a short identifier for this snapshot (first 12 chars of hash).
    pub fn short_id(&self) -> &str {
        &self.config_hash[..12.min(self.config_hash.len())]
    }
}

impl ConfigSummary {
    pub fn from_config(config: &ModelConfig) -> Self {
        ConfigSummary {
            class_count: config.class_count,
            feature_count: config.feature_count,
            noise_precision: config.noise_precision,
            representation: config.representation.as_str().to_string(),
            mode: config.mode.as_str().to_string(),
            sweeps: config.schedule.sweeps,
            divergence_policy: format!("{:?}", config.divergence.policy).to_lowercase(),
        }
    }
}

/// Hash string content with SHA-256.
pub fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Hash of the canonical JSON form of a configuration.
pub fn hash_config(config: &ModelConfig) -> String {
    let canonical = serde_json::to_string(config).unwrap_or_default();
    hash_content(&canonical)
}
