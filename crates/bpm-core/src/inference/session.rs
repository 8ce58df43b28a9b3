//! Training driver selected by `ModelConfig::mode`.

use bpm_common::{Batch, Error, Item, Result};
use bpm_config::{ModelConfig, TrainingMode};

use super::chunked::SharedClassifier;
use super::classifier::{ClassifierModel, InferenceStats};
use super::predict::Prediction;
use super::weights::ClassWeights;

/// A model plus the training procedure its configuration asks for.
#[derive(Debug, Clone)]
pub enum TrainingSession {
    /// Whole data set in one call from the canonical priors.
    Batch(ClassifierModel),
    /// Data fed as consecutive chunks, each posterior the next prior.
    Incremental(ClassifierModel),
    /// Chunk contributions combined over `schedule.passes` passes.
    Shared(SharedClassifier),
}

impl TrainingSession {
    pub fn from_config(config: ModelConfig) -> Result<Self> {
        Ok(match config.mode {
            TrainingMode::Batch => TrainingSession::Batch(ClassifierModel::new(config)?),
            TrainingMode::Incremental => TrainingSession::Incremental(ClassifierModel::new(config)?),
            TrainingMode::Shared => TrainingSession::Shared(SharedClassifier::new(config)?),
        })
    }

    pub fn mode(&self) -> TrainingMode {
        match self {
            TrainingSession::Batch(_) => TrainingMode::Batch,
            TrainingSession::Incremental(_) => TrainingMode::Incremental,
            TrainingSession::Shared(_) => TrainingMode::Shared,
        }
    }

    fn model(&self) -> &ClassifierModel {
        match self {
            TrainingSession::Batch(model) | TrainingSession::Incremental(model) => model,
            TrainingSession::Shared(shared) => shared.model(),
        }
    }

    /// Train on `batch`, chunking it by `chunking.max_items_per_chunk` for
    /// the incremental and shared modes. Without a chunking section the
    /// whole batch is one chunk.
    ///
    /// The whole batch is validated before the first chunk is trained.
    pub fn fit(&mut self, batch: Batch) -> Result<InferenceStats> {
        let config = self.model().config();
        batch
            .validate(config.class_count, config.feature_count)
            .map_err(|(_, err)| Error::InvalidDimension(err))?;
        let max_items = config.chunking.as_ref().map_or(0, |c| c.max_items_per_chunk);
        match self {
            TrainingSession::Batch(model) => model.train(&batch),
            TrainingSession::Incremental(model) => {
                let mut total = InferenceStats::default();
                for chunk in batch.into_chunks(max_items) {
                    let stats = model.train_incremental(&chunk.batch)?;
                    total.items += stats.items;
                    total.sweeps = stats.sweeps;
                    total.guarded_updates += stats.guarded_updates;
                    total.log_evidence += stats.log_evidence;
                }
                Ok(total)
            }
            TrainingSession::Shared(shared) => {
                let passes = shared.model().config().schedule.passes;
                let chunks = batch.into_chunks(max_items);
                shared.train_passes(&chunks, passes)
            }
        }
    }

    pub fn weights(&self) -> &ClassWeights {
        self.model().weights()
    }

    pub fn predict(&self, item: &Item) -> Result<Prediction> {
        self.model().predict(item)
    }

    pub fn predict_batch(&self, items: &[Item]) -> Result<Vec<Prediction>> {
        self.model().predict_batch(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bpm_common::LabeledItem;
    use bpm_config::{get_preset, PresetName};

    fn sample(n: usize) -> Batch {
        (0..n)
            .map(|i| {
                let label = i % 3;
                let x = label as f64 - 1.0;
                LabeledItem::new(Item::dense(vec![x, -x, 0.5 * x, 0.1 * i as f64 / n as f64]), label)
            })
            .collect()
    }

    #[test]
    fn presets_pick_their_driver() {
        let cases = [
            (PresetName::Batch, TrainingMode::Batch),
            (PresetName::Incremental, TrainingMode::Incremental),
            (PresetName::Shared, TrainingMode::Shared),
            (PresetName::Sparse, TrainingMode::Batch),
            (PresetName::SparseShared, TrainingMode::Shared),
        ];
        for (preset, mode) in cases {
            let session = TrainingSession::from_config(get_preset(preset)).unwrap();
            assert_eq!(session.mode(), mode);
        }
    }

    #[test]
    fn incremental_fit_visits_every_item_once() {
        let mut session = TrainingSession::from_config(get_preset(PresetName::Incremental)).unwrap();
        let stats = session.fit(sample(25)).unwrap();
        assert_eq!(stats.items, 25);
        assert!(session.weights().class(0).unwrap().is_pinned());
    }

    #[test]
    fn every_mode_learns_the_sample() {
        for preset in [PresetName::Batch, PresetName::Incremental, PresetName::SparseShared] {
            let mut session = TrainingSession::from_config(get_preset(preset)).unwrap();
            session.fit(sample(30)).unwrap();
            let prediction = session.predict(&Item::dense(vec![1.0, -1.0, 0.5, 0.0])).unwrap();
            assert_eq!(prediction.predicted_class(), 2, "preset {}", preset.as_str());
        }
    }

    #[test]
    fn shared_fit_reports_passes() {
        let mut config = get_preset(PresetName::Shared);
        config.schedule.passes = 2;
        let mut session = TrainingSession::from_config(config).unwrap();
        let stats = session.fit(sample(20)).unwrap();
        // last pass only
        assert_eq!(stats.items, 20);
    }
}
