//! Bayes Point Machine Core Library
//!
//! This library provides multiclass Bayes point machine inference:
//! - Ranking-constraint expectation propagation over per-class weights
//! - Batch, incremental and chunked (shared-variable) training
//! - Class prediction as an evidence-weighted mixture
//! - Configuration loading and structured logging

pub mod config;
pub mod inference;
pub mod logging;

pub use bpm_common::{Batch, Chunk, Error, Item, LabeledItem, Result, SparseItem};
pub use bpm_config::ModelConfig;
pub use inference::{
    ChunkCombiner, ClassWeights, ClassifierModel, InferenceStats, Prediction, PredictionEngine,
    SharedClassifier, TrainingSession,
};
