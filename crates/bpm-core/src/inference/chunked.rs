//! Shared-variable training over data chunks.
//!
//! Each chunk keeps the contribution it last made to the global weights.
//! Revisiting a chunk first divides that contribution out of the global
//! belief, trains from the resulting cavity, and multiplies the new
//! contribution back in. Re-running a chunk therefore replaces its
//! evidence instead of counting it twice.

use std::collections::BTreeMap;

use bpm_common::{Batch, Chunk, Error, Item, Result};
use bpm_config::{DivergenceConfig, ModelConfig};

use super::classifier::{ClassifierModel, InferenceStats};
use super::guard::DivergenceGuard;
use super::predict::Prediction;
use super::weights::ClassWeights;
use crate::logging::{event_names, LogContext, Stage};

/// Contribution table keyed by chunk index.
#[derive(Debug, Clone)]
pub struct ChunkCombiner {
    contributions: BTreeMap<usize, ClassWeights>,
    chunk_count: Option<usize>,
    guard: DivergenceGuard,
    ctx: LogContext,
}

impl ChunkCombiner {
    /// `chunk_count` bounds the accepted indices when set.
    pub fn new(chunk_count: Option<usize>) -> Self {
        let ctx = LogContext::default();
        Self {
            contributions: BTreeMap::new(),
            chunk_count,
            guard: DivergenceGuard::new(&DivergenceConfig::default(), &ctx, Stage::Combine),
            ctx,
        }
    }

    pub fn with_divergence(mut self, config: &DivergenceConfig) -> Self {
        self.guard = DivergenceGuard::new(config, &self.ctx, Stage::Combine);
        self
    }

    pub fn with_log_context(mut self, ctx: LogContext) -> Self {
        self.guard = DivergenceGuard::new(
            &DivergenceConfig {
                policy: self.guard.policy(),
                precision_floor: self.guard.precision_floor(),
            },
            &ctx,
            Stage::Combine,
        );
        self.ctx = ctx;
        self
    }

    pub fn chunk_count(&self) -> Option<usize> {
        self.chunk_count
    }

    pub fn check_index(&self, index: usize) -> Result<()> {
        match self.chunk_count {
            Some(chunk_count) if index >= chunk_count => {
                Err(Error::ChunkIndexOutOfRange { index, chunk_count })
            }
            _ => Ok(()),
        }
    }

    /// Last contribution recorded for `index`.
    pub fn contribution(&self, index: usize) -> Option<&ClassWeights> {
        self.contributions.get(&index)
    }

    /// Global belief with chunk `index` removed; the global belief itself
    /// on first visit. `None` when the divergence policy skipped the division.
    pub fn cavity(&mut self, global: &ClassWeights, index: usize) -> Result<Option<ClassWeights>> {
        self.check_index(index)?;
        match self.contributions.get(&index) {
            Some(old) => {
                global.divide_guarded(old, &mut self.guard, &format!("cavity of chunk {index}"))
            }
            None => Ok(Some(global.clone())),
        }
    }

    /// Replace chunk `index`'s contribution in `global`.
    ///
    /// Returns `false` when the policy skipped the update; `global` and the
    /// table are then unchanged.
    pub fn combine(
        &mut self,
        global: &mut ClassWeights,
        index: usize,
        contribution: ClassWeights,
    ) -> Result<bool> {
        let Some(cavity) = self.cavity(global, index)? else {
            return Ok(false);
        };
        self.combine_from_cavity(global, index, &cavity, contribution)?;
        Ok(true)
    }

    /// Like [`ChunkCombiner::combine`] with the cavity for `index` already
    /// computed by [`ChunkCombiner::cavity`].
    pub fn combine_from_cavity(
        &mut self,
        global: &mut ClassWeights,
        index: usize,
        cavity: &ClassWeights,
        contribution: ClassWeights,
    ) -> Result<()> {
        self.check_index(index)?;
        let updated = cavity.multiply(&contribution)?;
        let replaced = self.contributions.insert(index, contribution).is_some();
        *global = updated;
        crate::log_event!(
            self.ctx,
            DEBUG,
            event_names::CHUNK_COMBINED,
            Stage::Combine,
            "chunk contribution combined",
            chunk = index,
            replaced = replaced
        );
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.contributions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contributions.is_empty()
    }

    pub fn clear(&mut self) {
        self.contributions.clear();
    }

    /// Guarded divisions over the combiner's lifetime.
    pub fn guarded_updates(&self) -> usize {
        self.guard.events()
    }
}

/// Classifier trained chunk by chunk over shared weights.
#[derive(Debug, Clone)]
pub struct SharedClassifier {
    model: ClassifierModel,
    combiner: ChunkCombiner,
}

impl SharedClassifier {
    pub fn new(config: ModelConfig) -> Result<Self> {
        let chunk_count = config.chunking.as_ref().and_then(|c| c.chunk_count);
        let model = ClassifierModel::new(config)?;
        let combiner = ChunkCombiner::new(chunk_count)
            .with_log_context(model.log_context().clone())
            .with_divergence(&model.config().divergence);
        Ok(Self { model, combiner })
    }

    pub fn with_log_context(mut self, ctx: LogContext) -> Self {
        self.combiner = self.combiner.with_log_context(ctx.clone());
        self.model = self.model.with_log_context(ctx);
        self
    }

    pub fn model(&self) -> &ClassifierModel {
        &self.model
    }

    pub fn weights(&self) -> &ClassWeights {
        self.model.weights()
    }

    pub fn combiner(&self) -> &ChunkCombiner {
        &self.combiner
    }

    /// Train one chunk against the shared weights.
    pub fn train_chunk(&mut self, index: usize, batch: &Batch) -> Result<InferenceStats> {
        self.combiner.check_index(index)?;
        let config = self.model.config();
        batch
            .validate(config.class_count, config.feature_count)
            .map_err(|(_, err)| Error::InvalidDimension(err))?;

        let before = self.combiner.guarded_updates();
        let mut global = self.model.weights().clone();
        let Some(cavity) = self.combiner.cavity(&global, index)? else {
            return Ok(InferenceStats {
                guarded_updates: self.combiner.guarded_updates() - before,
                ..InferenceStats::default()
            });
        };
        let (posterior, mut stats) = self.model.infer_from(&cavity, batch)?;

        let mut guard = DivergenceGuard::new(
            &self.model.config().divergence,
            self.model.log_context(),
            Stage::Combine,
        );
        let contribution =
            posterior.divide_guarded(&cavity, &mut guard, &format!("contribution of chunk {index}"))?;
        if let Some(contribution) = contribution {
            self.combiner
                .combine_from_cavity(&mut global, index, &cavity, contribution)?;
            self.model.set_weights(global);
        }
        stats.guarded_updates += guard.events() + (self.combiner.guarded_updates() - before);
        Ok(stats)
    }

    /// One pass over `chunks` in order.
    pub fn train_chunks(&mut self, chunks: &[Chunk]) -> Result<InferenceStats> {
        let mut total = InferenceStats::default();
        for chunk in chunks {
            let stats = self.train_chunk(chunk.index, &chunk.batch)?;
            total.items += stats.items;
            total.sweeps = total.sweeps.max(stats.sweeps);
            total.guarded_updates += stats.guarded_updates;
            total.log_evidence += stats.log_evidence;
        }
        Ok(total)
    }

    /// Repeat [`SharedClassifier::train_chunks`] `passes` times.
    ///
    /// Returns the last pass's statistics with guarded updates summed over
    /// every pass.
    pub fn train_passes(&mut self, chunks: &[Chunk], passes: usize) -> Result<InferenceStats> {
        let mut last = InferenceStats::default();
        let mut guarded = 0;
        for pass in 0..passes {
            last = self.train_chunks(chunks)?;
            guarded += last.guarded_updates;
            crate::log_event!(
                self.model.log_context(),
                INFO,
                event_names::PASS_FINISHED,
                Stage::Combine,
                "pass over chunks finished",
                pass = pass + 1,
                chunks = chunks.len(),
                log_evidence = last.log_evidence
            );
        }
        last.guarded_updates = guarded;
        Ok(last)
    }

    pub fn predict(&self, item: &Item) -> Result<Prediction> {
        self.model.predict(item)
    }

    pub fn predict_batch(&self, items: &[Item]) -> Result<Vec<Prediction>> {
        self.model.predict_batch(items)
    }

    /// Canonical priors and an empty contribution table.
    pub fn reset(&mut self) {
        self.model.reset();
        self.combiner.clear();
    }
}
