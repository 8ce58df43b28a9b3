//! Class prediction from trained weights.

use bpm_common::{Error, Item, Result};
use bpm_config::{DivergenceConfig, ModelConfig};
use bpm_math::{Discrete, Gaussian, GaussianMoments};
use serde::{Deserialize, Serialize};

use super::gather::score_belief;
use super::guard::DivergenceGuard;
use super::ranking::winner_mixture;
use super::weights::ClassWeights;
use crate::logging::{event_names, LogContext, Stage};

/// Predicted class distribution for one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub distribution: Discrete,
    /// Mixed posterior score belief per class; a pinned score has variance 0.
    pub scores: Vec<GaussianMoments>,
}

impl Prediction {
    /// Most probable class, lowest index on ties.
    pub fn predicted_class(&self) -> usize {
        self.distribution.mode()
    }

    pub fn probability(&self, class: usize) -> f64 {
        self.distribution.prob(class)
    }
}

fn score_moments(belief: &Gaussian) -> GaussianMoments {
    GaussianMoments {
        mean: belief.mean(),
        variance: belief.variance(),
    }
}

/// Runs the winner mixture over per-class score beliefs.
///
/// Holds no weights; callers pass the trained [`ClassWeights`] by reference.
#[derive(Debug, Clone)]
pub struct PredictionEngine {
    noise_variance: f64,
    class_log_prior: Option<Vec<f64>>,
    divergence: DivergenceConfig,
    ctx: LogContext,
}

impl PredictionEngine {
    pub fn new(config: &ModelConfig) -> Self {
        Self {
            noise_variance: config.noise_variance(),
            class_log_prior: None,
            divergence: config.divergence.clone(),
            ctx: LogContext::default(),
        }
    }

    /// Non-uniform class prior. Weights are normalized.
    pub fn with_class_prior(mut self, weights: &[f64]) -> Result<Self> {
        let prior = Discrete::from_probs(weights.to_vec()).ok_or_else(|| {
            Error::InvalidConfig(
                "class prior needs finite non-negative weights with a positive sum".to_string(),
            )
        })?;
        self.class_log_prior = Some(prior.probs().iter().map(|p| p.ln()).collect());
        Ok(self)
    }

    pub fn with_log_context(mut self, ctx: LogContext) -> Self {
        self.ctx = ctx;
        self
    }

    fn log_prior(&self, class_count: usize) -> Result<Vec<f64>> {
        match &self.class_log_prior {
            Some(prior) if prior.len() != class_count => Err(Error::ClassCountMismatch {
                expected: class_count,
                actual: prior.len(),
            }),
            Some(prior) => Ok(prior.clone()),
            None => Ok(vec![-(class_count as f64).ln(); class_count]),
        }
    }

    fn predict_validated(
        &self,
        weights: &ClassWeights,
        item: &Item,
        log_prior: &[f64],
        guard: &mut DivergenceGuard,
    ) -> Result<Prediction> {
        let features = item.features();
        let scores = weights
            .classes()
            .iter()
            .map(|belief| score_belief(belief, &features))
            .collect::<Result<Vec<_>>>()?;
        let mixture = winner_mixture(&scores, self.noise_variance, log_prior, guard)?;
        Ok(Prediction {
            distribution: mixture.distribution,
            scores: mixture.scores.iter().map(score_moments).collect(),
        })
    }

    pub fn predict(&self, weights: &ClassWeights, item: &Item) -> Result<Prediction> {
        item.validate(weights.feature_count())?;
        let log_prior = self.log_prior(weights.class_count())?;
        let mut guard = DivergenceGuard::new(&self.divergence, &self.ctx, Stage::Predict);
        self.predict_validated(weights, item, &log_prior, &mut guard)
    }

    /// Every item is validated before any prediction is made.
    pub fn predict_batch(&self, weights: &ClassWeights, items: &[Item]) -> Result<Vec<Prediction>> {
        for item in items {
            item.validate(weights.feature_count())?;
        }
        let log_prior = self.log_prior(weights.class_count())?;
        let mut guard = DivergenceGuard::new(&self.divergence, &self.ctx, Stage::Predict);
        let predictions = items
            .iter()
            .map(|item| self.predict_validated(weights, item, &log_prior, &mut guard))
            .collect::<Result<Vec<_>>>()?;
        crate::log_event!(
            self.ctx,
            DEBUG,
            event_names::PREDICT_FINISHED,
            Stage::Predict,
            "batch prediction finished",
            items = predictions.len(),
            guarded_updates = guard.events()
        );
        Ok(predictions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bpm_common::DimensionError;
    use bpm_math::VectorGaussian;
    use nalgebra::{DMatrix, DVector};

    use crate::inference::weights::WeightBelief;

    fn trained_like() -> (ModelConfig, ClassWeights) {
        let config = ModelConfig::new(3, 2);
        let anchor = WeightBelief::Dense(VectorGaussian::point_mass(DVector::zeros(2)));
        let up = WeightBelief::Dense(
            VectorGaussian::from_mean_and_precision(
                DVector::from_vec(vec![2.0, 0.0]),
                DMatrix::identity(2, 2) * 4.0,
            )
            .unwrap(),
        );
        let down = WeightBelief::Dense(
            VectorGaussian::from_mean_and_precision(
                DVector::from_vec(vec![-2.0, 0.0]),
                DMatrix::identity(2, 2) * 4.0,
            )
            .unwrap(),
        );
        let weights = ClassWeights::from_beliefs(vec![anchor, up, down]).unwrap();
        (config, weights)
    }

    #[test]
    fn prediction_follows_feature_sign() {
        let (config, weights) = trained_like();
        let engine = PredictionEngine::new(&config);
        let pos = engine.predict(&weights, &Item::dense(vec![2.0, 0.0])).unwrap();
        let neg = engine.predict(&weights, &Item::dense(vec![-2.0, 0.0])).unwrap();
        assert_eq!(pos.predicted_class(), 1);
        assert_eq!(neg.predicted_class(), 2);
        let total: f64 = pos.distribution.probs().iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn anchor_score_is_pinned() {
        let (config, weights) = trained_like();
        let engine = PredictionEngine::new(&config);
        let prediction = engine.predict(&weights, &Item::dense(vec![1.0, 1.0])).unwrap();
        assert_eq!(prediction.scores[0].variance, 0.0);
        assert_eq!(prediction.scores[0].mean, 0.0);
        assert!(prediction.scores[1].variance > 0.0);
    }

    #[test]
    fn zero_item_falls_back_to_prior() {
        let (config, weights) = trained_like();
        let engine = PredictionEngine::new(&config)
            .with_class_prior(&[1.0, 2.0, 1.0])
            .unwrap();
        let prediction = engine.predict(&weights, &Item::dense(vec![0.0, 0.0])).unwrap();
        // all scores are pinned at zero: every ordering is equally likely
        assert!((prediction.probability(1) - 0.5).abs() < 1e-9);
        assert!((prediction.probability(0) - 0.25).abs() < 1e-9);
    }

    #[test]
    fn batch_rejects_any_invalid_item_up_front() {
        let (config, weights) = trained_like();
        let engine = PredictionEngine::new(&config);
        let items = vec![Item::dense(vec![1.0, 0.0]), Item::dense(vec![1.0])];
        let err = engine.predict_batch(&weights, &items).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidDimension(DimensionError::DenseLengthMismatch { .. })
        ));
    }

    #[test]
    fn class_prior_must_match_class_count() {
        let (config, weights) = trained_like();
        let engine = PredictionEngine::new(&config).with_class_prior(&[1.0, 1.0]).unwrap();
        assert!(matches!(
            engine.predict(&weights, &Item::dense(vec![1.0, 0.0])),
            Err(Error::ClassCountMismatch { .. })
        ));
        assert!(PredictionEngine::new(&config).with_class_prior(&[0.0, 0.0, 0.0]).is_err());
    }

    #[test]
    fn prediction_serializes_to_json() {
        let (config, weights) = trained_like();
        let engine = PredictionEngine::new(&config);
        let prediction = engine.predict(&weights, &Item::dense(vec![0.5, 0.5])).unwrap();
        let json = serde_json::to_string(&prediction).unwrap();
        let back: Prediction = serde_json::from_str(&json).unwrap();
        assert_eq!(back.predicted_class(), prediction.predicted_class());
    }
}
