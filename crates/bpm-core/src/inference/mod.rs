//! Inference engine modules.

pub mod chunked;
pub mod classifier;
pub mod gather;
pub mod guard;
pub mod predict;
pub mod ranking;
pub mod session;
pub mod weights;

pub use chunked::{ChunkCombiner, SharedClassifier};
pub use classifier::{run_schedule, ClassifierModel, InferenceStats};
pub use gather::{score_belief, WeightMessage};
pub use guard::{DivergenceGuard, GuardAction};
pub use predict::{Prediction, PredictionEngine};
pub use ranking::{constrain_winner, winner_mixture, MixtureOutcome, RankingOutcome};
pub use session::TrainingSession;
pub use weights::{ClassWeights, WeightBelief, WeightMoments};
