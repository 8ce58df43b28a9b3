//! Property-based tests for prediction.
//!
//! Random trained-looking weights and random items: the predicted
//! distribution must always be a proper categorical distribution, and the
//! sparse and dense forms of one item must predict the same thing.

use bpm_core::config::{ModelConfig, WeightRepresentation};
use bpm_core::inference::{ClassWeights, PredictionEngine, WeightBelief};
use bpm_core::{Item, SparseItem};
use bpm_math::{Gaussian, VectorGaussian};
use nalgebra::{DMatrix, DVector};
use proptest::prelude::*;

const CLASSES: usize = 4;
const FEATURES: usize = 5;

fn dense_class() -> impl Strategy<Value = WeightBelief> {
    (
        prop::collection::vec(-4.0..4.0f64, FEATURES),
        prop::collection::vec(0.05..20.0f64, FEATURES),
    )
        .prop_map(|(mean, diag)| {
            let precision = DMatrix::from_diagonal(&DVector::from_vec(diag));
            WeightBelief::Dense(
                VectorGaussian::from_mean_and_precision(DVector::from_vec(mean), precision).unwrap(),
            )
        })
}

fn factorized_class() -> impl Strategy<Value = WeightBelief> {
    prop::collection::vec((-4.0..4.0f64, 0.05..20.0f64), FEATURES).prop_map(|params| {
        WeightBelief::Factorized(
            params
                .into_iter()
                .map(|(m, p)| Gaussian::from_mean_and_precision(m, p).unwrap())
                .collect(),
        )
    })
}

fn weights(representation: WeightRepresentation) -> BoxedStrategy<ClassWeights> {
    let class = match representation {
        WeightRepresentation::Dense => dense_class().boxed(),
        WeightRepresentation::Factorized => factorized_class().boxed(),
    };
    prop::collection::vec(class, CLASSES - 1)
        .prop_map(move |mut classes| {
            classes.insert(0, WeightBelief::anchor(representation, FEATURES));
            ClassWeights::from_beliefs(classes).unwrap()
        })
        .boxed()
}

/// Dense feature vectors with roughly half the entries exactly zero.
fn values() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(prop_oneof![Just(0.0), -5.0..5.0f64], FEATURES)
}

fn engine(noise_precision: f64) -> PredictionEngine {
    PredictionEngine::new(&ModelConfig::new(CLASSES, FEATURES).with_noise_precision(noise_precision))
}

fn assert_proper(probs: &[f64]) -> Result<(), TestCaseError> {
    prop_assert_eq!(probs.len(), CLASSES);
    for p in probs {
        prop_assert!(*p >= 0.0 && p.is_finite(), "bad probability {}", p);
    }
    let total: f64 = probs.iter().sum();
    prop_assert!((total - 1.0).abs() < 1e-9, "sum {}", total);
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn dense_predictions_are_normalized(
        w in weights(WeightRepresentation::Dense),
        x in values(),
        noise in 0.01..100.0f64,
    ) {
        let prediction = engine(noise).predict(&w, &Item::dense(x)).unwrap();
        assert_proper(prediction.distribution.probs())?;
        prop_assert_eq!(prediction.scores.len(), CLASSES);
        prop_assert_eq!(prediction.scores[0].variance, 0.0);
    }

    #[test]
    fn factorized_predictions_are_normalized(
        w in weights(WeightRepresentation::Factorized),
        x in values(),
        noise in 0.01..100.0f64,
    ) {
        let prediction = engine(noise).predict(&w, &Item::dense(x)).unwrap();
        assert_proper(prediction.distribution.probs())?;
        for score in &prediction.scores {
            prop_assert!(score.variance >= 0.0 && score.mean.is_finite());
        }
    }

    #[test]
    fn sparse_and_dense_items_predict_alike(
        w in weights(WeightRepresentation::Dense),
        x in values(),
    ) {
        let engine = engine(1.0);
        let dense = engine.predict(&w, &Item::dense(x.clone())).unwrap();
        let sparse = engine
            .predict(&w, &Item::Sparse(SparseItem::from_dense(&x, 0.0)))
            .unwrap();
        for k in 0..CLASSES {
            prop_assert!((dense.probability(k) - sparse.probability(k)).abs() < 1e-12);
        }
    }

    #[test]
    fn class_prior_keeps_normalization(
        w in weights(WeightRepresentation::Factorized),
        x in values(),
        prior in prop::collection::vec(0.01..10.0f64, CLASSES),
    ) {
        let engine = engine(1.0).with_class_prior(&prior).unwrap();
        let batch = engine.predict_batch(&w, &[Item::dense(x.clone()), Item::dense(x)]).unwrap();
        assert_proper(batch[0].distribution.probs())?;
        prop_assert_eq!(&batch[0], &batch[1]);
    }
}

#[test]
fn extreme_scores_stay_finite() {
    let mut classes = vec![WeightBelief::anchor(WeightRepresentation::Dense, FEATURES)];
    for k in 1..CLASSES {
        let mean = DVector::from_element(FEATURES, 1e3 * k as f64);
        let precision = DMatrix::identity(FEATURES, FEATURES) * 1e6;
        classes.push(WeightBelief::Dense(
            VectorGaussian::from_mean_and_precision(mean, precision).unwrap(),
        ));
    }
    let w = ClassWeights::from_beliefs(classes).unwrap();
    let prediction = engine(1e3).predict(&w, &Item::dense(vec![50.0; FEATURES])).unwrap();
    let probs = prediction.distribution.probs();
    assert!(probs.iter().all(|p| p.is_finite() && *p >= 0.0));
    assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    assert_eq!(prediction.predicted_class(), CLASSES - 1);
}
