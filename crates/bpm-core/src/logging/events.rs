//! Structured event definitions for logging.
//!
//! Events carry a run id, an optional model id, and the stage of the
//! training/prediction pipeline that emitted them.

use serde::{Deserialize, Serialize};

/// Pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Configuration loading and model construction.
    Init,
    /// Item schedules over a batch or chunk.
    Train,
    /// Folding a chunk contribution into the shared belief.
    Combine,
    /// Mixture prediction over unlabeled items.
    Predict,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Init => "init",
            Stage::Train => "train",
            Stage::Combine => "combine",
            Stage::Predict => "predict",
        };
        write!(f, "{}", s)
    }
}

/// Standard event names, used as `tracing` targets.
pub mod event_names {
    // Config/init
    pub const CONFIG_LOADED: &str = "config.loaded";
    pub const CONFIG_DEFAULT_USED: &str = "config.default_used";
    pub const MODEL_CREATED: &str = "model.created";
    pub const MODEL_RESET: &str = "model.reset";

    // Train stage
    pub const TRAIN_STARTED: &str = "train.started";
    pub const TRAIN_SWEEP_DONE: &str = "train.sweep_done";
    pub const TRAIN_GUARDED_UPDATE: &str = "train.guarded_update";
    pub const TRAIN_EMPTY_BATCH: &str = "train.empty_batch";
    pub const TRAIN_EMPTY_CLASS: &str = "train.empty_class";
    pub const TRAIN_FINISHED: &str = "train.finished";

    // Combine stage
    pub const CHUNK_COMBINED: &str = "chunk.combined";
    pub const PASS_FINISHED: &str = "chunk.pass_finished";

    // Predict stage
    pub const PREDICT_FINISHED: &str = "predict.finished";
}

/// Correlation ids shared by every event a model emits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogContext {
    pub run_id: String,
    pub model_id: Option<String>,
}

impl Default for LogContext {
    fn default() -> Self {
        LogContext::new(super::generate_run_id())
    }
}

impl LogContext {
    pub fn new(run_id: impl Into<String>) -> Self {
        LogContext {
            run_id: run_id.into(),
            model_id: None,
        }
    }

    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = Some(model_id.into());
        self
    }

    /// Model id for display, `-` when unnamed.
    pub fn model_label(&self) -> &str {
        self.model_id.as_deref().unwrap_or("-")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_context_carries_model_id() {
        let ctx = LogContext::new("run-abc").with_model_id("iris-dense");
        assert_eq!(ctx.run_id, "run-abc");
        assert_eq!(ctx.model_label(), "iris-dense");
        assert_eq!(LogContext::new("run-x").model_label(), "-");
        assert!(LogContext::default().run_id.starts_with("run-"));
    }

    #[test]
    fn test_stage_display_matches_serde() {
        for stage in [Stage::Init, Stage::Train, Stage::Combine, Stage::Predict] {
            let json = serde_json::to_string(&stage).unwrap();
            assert_eq!(json, format!("\"{}\"", stage));
        }
    }

    #[test]
    fn test_event_names() {
        assert_eq!(event_names::TRAIN_STARTED, "train.started");
        assert_eq!(event_names::CHUNK_COMBINED, "chunk.combined");
        assert_eq!(event_names::PREDICT_FINISHED, "predict.finished");
    }
}
