//! Batch and incremental training.
//!
//! One call runs `schedule.sweeps` passes over the batch. Each item:
//! cavity = class belief with the item's previous message removed, score
//! beliefs from the cavities, ranking constraint for the item's label, and
//! the resulting weight messages absorbed back. The working beliefs are a
//! copy; the model only sees them once the whole call has succeeded.

use std::borrow::Cow;

use bpm_common::{Batch, Error, Item, Result, SparseItem};
use bpm_config::{validate_model_config, ConfigSnapshot, ModelConfig};
use bpm_math::BeliefError;
use serde::{Deserialize, Serialize};

use super::gather::{absorb, retract, score_belief, weight_message, WeightMessage};
use super::guard::DivergenceGuard;
use super::predict::{Prediction, PredictionEngine};
use super::ranking::{constrain_winner, noisy_scores};
use super::weights::{ClassWeights, WeightBelief};
use crate::config::ConfigError;
use crate::logging::{event_names, LogContext, Stage};

/// Summary of one training call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct InferenceStats {
    pub items: usize,
    pub sweeps: usize,
    /// Divergence events handled by the policy during the call.
    pub guarded_updates: usize,
    /// `sum log Z` over the items of the last sweep.
    pub log_evidence: f64,
}

/// Run the message schedule from `prior` over `batch`.
///
/// Returns the posterior and call statistics. `prior` is never modified.
pub fn run_schedule(
    prior: &ClassWeights,
    batch: &Batch,
    config: &ModelConfig,
    guard: &mut DivergenceGuard,
    ctx: &LogContext,
) -> Result<(ClassWeights, InferenceStats)> {
    if prior.class_count() != config.class_count {
        return Err(Error::ClassCountMismatch {
            expected: config.class_count,
            actual: prior.class_count(),
        });
    }
    if prior.feature_count() != config.feature_count {
        return Err(BeliefError::DimensionMismatch {
            expected: config.feature_count,
            actual: prior.feature_count(),
        }
        .into());
    }
    batch
        .validate(config.class_count, config.feature_count)
        .map_err(|(_, err)| Error::InvalidDimension(err))?;

    let sweeps = config.schedule.sweeps.max(1);
    let events_before = guard.events();
    if batch.is_empty() {
        crate::log_event!(
            ctx,
            DEBUG,
            event_names::TRAIN_EMPTY_BATCH,
            Stage::Train,
            "empty batch, beliefs unchanged"
        );
        return Ok((
            prior.clone(),
            InferenceStats {
                sweeps,
                ..InferenceStats::default()
            },
        ));
    }
    for (class, count) in batch.class_counts(config.class_count).into_iter().enumerate() {
        if count == 0 {
            crate::log_event!(
                ctx,
                DEBUG,
                event_names::TRAIN_EMPTY_CLASS,
                Stage::Train,
                "class has no items in this batch",
                class = class
            );
        }
    }

    let noise_variance = config.noise_variance();
    let keep_messages = sweeps > 1;
    let mut stored: Vec<Vec<Option<WeightMessage>>> = if keep_messages {
        vec![vec![None; config.class_count]; batch.len()]
    } else {
        Vec::new()
    };

    let mut working = prior.clone();
    let mut log_evidence = 0.0;
    for sweep in 0..sweeps {
        log_evidence = 0.0;
        for (position, labeled) in batch.items().iter().enumerate() {
            let features = labeled.item.features();

            let mut cavities: Vec<Cow<'_, WeightBelief>> = Vec::with_capacity(working.class_count());
            for (k, belief) in working.classes().iter().enumerate() {
                let previous = stored.get(position).and_then(|row| row[k].as_ref());
                cavities.push(match previous {
                    Some(message) => Cow::Owned(retract(belief, &features, message, guard)?),
                    None => Cow::Borrowed(belief),
                });
            }

            let scores = cavities
                .iter()
                .map(|cavity| score_belief(cavity, &features))
                .collect::<Result<Vec<_>>>()?;
            let noisy = noisy_scores(&scores, noise_variance);
            let outcome = constrain_winner(&noisy, labeled.label, guard)?;
            log_evidence += outcome.log_evidence;

            let mut updated = Vec::with_capacity(cavities.len());
            for (k, (cavity, score_message)) in cavities
                .into_iter()
                .zip(outcome.score_messages(noise_variance))
                .enumerate()
            {
                if cavity.is_pinned() {
                    continue;
                }
                let message = weight_message(&cavity, &features, &score_message)?;
                let mut belief = cavity.into_owned();
                absorb(&mut belief, &features, &message)?;
                updated.push((k, belief));
                if let Some(row) = stored.get_mut(position) {
                    row[k] = Some(message);
                }
            }
            let classes = working.classes_mut();
            for (k, belief) in updated {
                classes[k] = belief;
            }
        }
        crate::log_event!(
            ctx,
            DEBUG,
            event_names::TRAIN_SWEEP_DONE,
            Stage::Train,
            "sweep finished",
            sweep = sweep + 1,
            log_evidence = log_evidence
        );
    }

    Ok((
        working,
        InferenceStats {
            items: batch.len(),
            sweeps,
            guarded_updates: guard.events() - events_before,
            log_evidence,
        },
    ))
}

/// Multiclass Bayes point machine trained by batch or incremental calls.
#[derive(Debug, Clone)]
pub struct ClassifierModel {
    config: ModelConfig,
    prior: ClassWeights,
    weights: ClassWeights,
    engine: PredictionEngine,
    ctx: LogContext,
}

impl ClassifierModel {
    /// Validate `config` and start from the canonical priors.
    pub fn new(config: ModelConfig) -> Result<Self> {
        validate_model_config(&config).map_err(ConfigError::from)?;
        let prior = ClassWeights::canonical(&config)?;
        Ok(Self::assemble(config, prior.clone(), prior))
    }

    /// Resume from previously trained weights, e.g. loaded from moments.
    pub fn from_weights(config: ModelConfig, weights: ClassWeights) -> Result<Self> {
        validate_model_config(&config).map_err(ConfigError::from)?;
        if weights.class_count() != config.class_count {
            return Err(Error::ClassCountMismatch {
                expected: config.class_count,
                actual: weights.class_count(),
            });
        }
        if weights.feature_count() != config.feature_count {
            return Err(BeliefError::DimensionMismatch {
                expected: config.feature_count,
                actual: weights.feature_count(),
            }
            .into());
        }
        if weights.representation() != config.representation {
            return Err(Error::InvalidConfig(format!(
                "weights are {} but the model is configured as {}",
                weights.representation().as_str(),
                config.representation.as_str()
            )));
        }
        let prior = ClassWeights::canonical(&config)?;
        Ok(Self::assemble(config, prior, weights))
    }

    fn assemble(config: ModelConfig, prior: ClassWeights, weights: ClassWeights) -> Self {
        let snapshot = ConfigSnapshot::from_config(&config);
        let ctx = LogContext::default().with_model_id(format!("bpm-{}", snapshot.short_id()));
        let engine = PredictionEngine::new(&config).with_log_context(ctx.clone());
        crate::log_event!(
            ctx,
            INFO,
            event_names::MODEL_CREATED,
            Stage::Init,
            "classifier created",
            classes = config.class_count,
            features = config.feature_count,
            representation = config.representation.as_str(),
            mode = config.mode.as_str()
        );
        Self {
            config,
            prior,
            weights,
            engine,
            ctx,
        }
    }

    pub fn with_log_context(mut self, ctx: LogContext) -> Self {
        self.engine = self.engine.with_log_context(ctx.clone());
        self.ctx = ctx;
        self
    }

    /// Non-uniform class prior for prediction.
    pub fn with_class_prior(mut self, weights: &[f64]) -> Result<Self> {
        self.engine = self.engine.with_class_prior(weights)?;
        Ok(self)
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn weights(&self) -> &ClassWeights {
        &self.weights
    }

    pub fn log_context(&self) -> &LogContext {
        &self.ctx
    }

    /// Train from the canonical priors; earlier training is discarded.
    pub fn train(&mut self, batch: &Batch) -> Result<InferenceStats> {
        let (posterior, stats) = self.infer_from(&self.prior, batch)?;
        self.weights = posterior;
        Ok(stats)
    }

    /// Train from the current weights.
    pub fn train_incremental(&mut self, batch: &Batch) -> Result<InferenceStats> {
        let (posterior, stats) = self.infer_from(&self.weights, batch)?;
        self.weights = posterior;
        Ok(stats)
    }

    /// Posterior of `batch` starting from `prior`; the model is not touched.
    pub(crate) fn infer_from(
        &self,
        prior: &ClassWeights,
        batch: &Batch,
    ) -> Result<(ClassWeights, InferenceStats)> {
        crate::log_event!(
            self.ctx,
            INFO,
            event_names::TRAIN_STARTED,
            Stage::Train,
            "training started",
            items = batch.len(),
            sweeps = self.config.schedule.sweeps
        );
        let mut guard = DivergenceGuard::new(&self.config.divergence, &self.ctx, Stage::Train);
        let (posterior, stats) = run_schedule(prior, batch, &self.config, &mut guard, &self.ctx)?;
        crate::log_event!(
            self.ctx,
            INFO,
            event_names::TRAIN_FINISHED,
            Stage::Train,
            "training finished",
            items = stats.items,
            guarded_updates = stats.guarded_updates,
            log_evidence = stats.log_evidence
        );
        Ok((posterior, stats))
    }

    pub(crate) fn set_weights(&mut self, weights: ClassWeights) {
        self.weights = weights;
    }

    /// Back to the canonical priors.
    pub fn reset(&mut self) {
        self.weights = self.prior.clone();
        crate::log_event!(
            self.ctx,
            INFO,
            event_names::MODEL_RESET,
            Stage::Init,
            "weights reset to priors"
        );
    }

    pub fn predict(&self, item: &Item) -> Result<Prediction> {
        self.engine.predict(&self.weights, item)
    }

    pub fn predict_batch(&self, items: &[Item]) -> Result<Vec<Prediction>> {
        self.engine.predict_batch(&self.weights, items)
    }

    /// Sparse form of a dense vector, dropping the configured ignore value.
    pub fn sparsify(&self, values: &[f64]) -> SparseItem {
        SparseItem::from_dense(values, self.config.value_to_ignore)
    }
}
