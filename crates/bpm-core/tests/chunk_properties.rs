//! Chunked training: combiner algebra and convergence across splits.

use bpm_core::config::{
    get_preset, DivergenceConfig, DivergencePolicy, ModelConfig, PresetName, WeightRepresentation,
};
use bpm_core::inference::{
    ChunkCombiner, ClassWeights, ClassifierModel, SharedClassifier, WeightBelief,
};
use bpm_core::{Batch, Error, Item, LabeledItem};
use bpm_math::{Gaussian, VectorGaussian};
use nalgebra::{DMatrix, DVector};
use proptest::prelude::*;

fn dataset() -> Batch {
    let points = [
        ([1.2, 0.3], 1),
        ([-0.9, 0.4], 0),
        ([0.8, -0.6], 1),
        ([-1.1, -0.2], 0),
        ([1.5, 0.1], 1),
        ([-0.4, 0.9], 0),
        ([0.3, -1.0], 1),
        ([-1.3, 0.5], 0),
        ([0.9, 0.8], 1),
        ([-0.7, -0.8], 0),
        ([1.1, -0.3], 1),
        ([-0.2, 0.2], 0),
    ];
    points
        .iter()
        .map(|(x, label)| LabeledItem::new(Item::dense(x.to_vec()), *label))
        .collect()
}

fn converged(config: &ModelConfig, max_items: usize, passes: usize) -> ClassWeights {
    let mut shared = SharedClassifier::new(config.clone()).unwrap();
    let chunks = dataset().into_chunks(max_items);
    shared.train_passes(&chunks, passes).unwrap();
    shared.weights().clone()
}

#[test]
fn splits_converge_to_the_same_beliefs() {
    let config = ModelConfig::new(2, 2).with_noise_precision(1.0).with_sweeps(20);
    let by_three = converged(&config, 3, 40);
    let by_four = converged(&config, 4, 40);
    let diff = by_three.max_abs_diff(&by_four);
    assert!(diff < 1e-3, "splits differ by {diff}");

    // and both agree with full-batch EP
    let mut batch = ClassifierModel::new(config.with_sweeps(60)).unwrap();
    batch.train(&dataset()).unwrap();
    let diff = by_three.max_abs_diff(batch.weights());
    assert!(diff < 1e-3, "chunked differs from batch by {diff}");
}

/// Three classes over four features, matching the preset shape.
fn preset_dataset() -> Batch {
    (0..24)
        .map(|i| {
            let label = i % 3;
            let jitter = ((i * 7) % 5) as f64 * 0.1 - 0.2;
            let mut x = vec![jitter, -jitter, 0.5 * jitter, 0.3];
            x[label] += 1.0;
            LabeledItem::new(Item::dense(x), label)
        })
        .collect()
}

#[test]
fn shared_presets_converge_across_splits() {
    for preset in [PresetName::Shared, PresetName::SparseShared] {
        let config = get_preset(preset);
        let run = |max_items: usize| {
            let mut shared = SharedClassifier::new(config.clone()).unwrap();
            shared
                .train_passes(&preset_dataset().into_chunks(max_items), 40)
                .unwrap();
            shared.weights().clone()
        };
        let diff = run(3).max_abs_diff(&run(4));
        assert!(diff < 1e-2, "preset {preset}: splits differ by {diff}");
    }
}

#[test]
fn factorized_splits_agree() {
    let config = ModelConfig::new(2, 2)
        .with_representation(WeightRepresentation::Factorized)
        .with_sweeps(20);
    let by_two = converged(&config, 2, 40);
    let by_six = converged(&config, 6, 40);
    assert!(by_two.max_abs_diff(&by_six) < 1e-3);
    assert!(by_two.class(0).unwrap().is_pinned());
}

#[test]
fn another_pass_after_convergence_is_stable() {
    let config = ModelConfig::new(2, 2).with_sweeps(20);
    let mut shared = SharedClassifier::new(config).unwrap();
    let chunks = dataset().into_chunks(4);
    shared.train_passes(&chunks, 40).unwrap();
    let settled = shared.weights().clone();
    shared.train_chunks(&chunks).unwrap();
    assert!(shared.weights().max_abs_diff(&settled) < 1e-6);
    assert_eq!(shared.combiner().len(), 3);
}

// ============================================================================
// Combiner divergence policies
// ============================================================================

fn factorized(classes: Vec<Vec<Gaussian>>) -> ClassWeights {
    ClassWeights::from_beliefs(classes.into_iter().map(WeightBelief::Factorized).collect()).unwrap()
}

fn g(mean: f64, precision: f64) -> Gaussian {
    Gaussian::from_mean_and_precision(mean, precision).unwrap()
}

/// A combiner holding a contribution sharper than the global belief it is
/// later asked to divide.
fn overcommitted(policy: DivergencePolicy) -> (ChunkCombiner, ClassWeights) {
    let config = ModelConfig::new(2, 1).with_representation(WeightRepresentation::Factorized);
    let mut combiner = ChunkCombiner::new(None).with_divergence(&DivergenceConfig {
        policy,
        precision_floor: 1e-10,
    });
    let mut scratch = factorized(vec![vec![Gaussian::point_mass(0.0)], vec![g(0.0, 1.0)]]);
    let contribution = factorized(vec![vec![Gaussian::uniform()], vec![g(0.5, 5.0)]]);
    assert!(combiner.combine(&mut scratch, 0, contribution).unwrap());
    (combiner, ClassWeights::canonical(&config).unwrap())
}

#[test]
fn combiner_fail_policy_raises() {
    let (mut combiner, global) = overcommitted(DivergencePolicy::Fail);
    assert!(matches!(
        combiner.cavity(&global, 0),
        Err(Error::InferenceDivergence { .. })
    ));
    assert_eq!(combiner.guarded_updates(), 1);
}

#[test]
fn combiner_skip_policy_leaves_global_alone() {
    let (mut combiner, mut global) = overcommitted(DivergencePolicy::Skip);
    let before = global.clone();
    let replacement = factorized(vec![vec![Gaussian::uniform()], vec![g(0.0, 0.5)]]);
    assert!(!combiner.combine(&mut global, 0, replacement).unwrap());
    assert_eq!(global, before);
    assert_eq!(combiner.guarded_updates(), 1);
}

#[test]
fn combiner_clamp_policy_floors_precision() {
    let (mut combiner, global) = overcommitted(DivergencePolicy::Clamp);
    let cavity = combiner.cavity(&global, 0).unwrap().unwrap();
    let WeightBelief::Factorized(features) = cavity.class(1).unwrap() else {
        panic!("expected factorized belief");
    };
    assert!((features[0].precision() - 1e-10).abs() < 1e-20);
    assert!(cavity.class(0).unwrap().is_pinned());
}

// ============================================================================
// Combination algebra
// ============================================================================

fn factorized_weights() -> impl Strategy<Value = ClassWeights> {
    prop::collection::vec((-3.0..3.0f64, 0.1..4.0f64), 6).prop_map(|params| {
        let beliefs: Vec<Gaussian> = params.iter().map(|(m, p)| g(*m, *p)).collect();
        factorized(vec![beliefs[..3].to_vec(), beliefs[3..].to_vec()])
    })
}

fn dense_weights() -> impl Strategy<Value = ClassWeights> {
    prop::collection::vec((-3.0..3.0f64, 0.1..4.0f64), 4).prop_map(|params| {
        let classes = params
            .chunks(2)
            .map(|pair| {
                let mean = DVector::from_vec(pair.iter().map(|(m, _)| *m).collect());
                let precision =
                    DMatrix::from_diagonal(&DVector::from_vec(pair.iter().map(|(_, p)| *p).collect()));
                WeightBelief::Dense(VectorGaussian::from_mean_and_precision(mean, precision).unwrap())
            })
            .collect();
        ClassWeights::from_beliefs(classes).unwrap()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn combination_commutes(a in factorized_weights(), b in factorized_weights()) {
        let ab = a.multiply(&b).unwrap();
        let ba = b.multiply(&a).unwrap();
        prop_assert!(ab.max_abs_diff(&ba) < 1e-9);
    }

    #[test]
    fn combination_associates(
        a in factorized_weights(),
        b in factorized_weights(),
        c in factorized_weights(),
    ) {
        let left = a.multiply(&b).unwrap().multiply(&c).unwrap();
        let right = a.multiply(&b.multiply(&c).unwrap()).unwrap();
        prop_assert!(left.max_abs_diff(&right) < 1e-9);
    }

    #[test]
    fn dense_combination_associates(
        a in dense_weights(),
        b in dense_weights(),
        c in dense_weights(),
    ) {
        let left = a.multiply(&b).unwrap().multiply(&c).unwrap();
        let right = c.multiply(&a).unwrap().multiply(&b).unwrap();
        prop_assert!(left.max_abs_diff(&right) < 1e-9);
    }

    /// Recombining a chunk with the same contribution is a no-op.
    #[test]
    fn recombine_is_idempotent(prior in factorized_weights(), contribution in factorized_weights()) {
        let mut global = prior.clone();
        let mut combiner = ChunkCombiner::new(None);
        prop_assert!(combiner.combine(&mut global, 7, contribution.clone()).unwrap());
        let once = global.clone();
        prop_assert!(combiner.combine(&mut global, 7, contribution).unwrap());
        prop_assert!(global.max_abs_diff(&once) < 1e-9);
        prop_assert!(combiner.cavity(&global, 7).unwrap().unwrap().max_abs_diff(&prior) < 1e-9);
    }

    /// Chunk order does not matter for the combined belief.
    #[test]
    fn chunk_order_is_irrelevant(
        prior in factorized_weights(),
        first in factorized_weights(),
        second in factorized_weights(),
    ) {
        let mut forward = prior.clone();
        let mut combiner = ChunkCombiner::new(None);
        combiner.combine(&mut forward, 0, first.clone()).unwrap();
        combiner.combine(&mut forward, 1, second.clone()).unwrap();

        let mut backward = prior;
        let mut combiner = ChunkCombiner::new(None);
        combiner.combine(&mut backward, 1, second).unwrap();
        combiner.combine(&mut backward, 0, first).unwrap();
        prop_assert!(forward.max_abs_diff(&backward) < 1e-9);
    }
}
