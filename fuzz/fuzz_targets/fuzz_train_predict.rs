//! Fuzz target for training and prediction on structured input.
//!
//! Any finite data must train and predict without panicking, and every
//! prediction must be a normalized distribution.

#![no_main]

use arbitrary::Arbitrary;
use bpm_common::{Batch, Item, LabeledItem};
use bpm_config::{ModelConfig, WeightRepresentation};
use bpm_core::ClassifierModel;
use libfuzzer_sys::fuzz_target;

const FEATURES: usize = 3;

#[derive(Debug, Arbitrary)]
struct Input {
    factorized: bool,
    classes: u8,
    noise_precision: u16,
    sweeps: u8,
    items: Vec<([i16; FEATURES], u8)>,
}

fuzz_target!(|input: Input| {
    let classes = 2 + (input.classes % 4) as usize;
    let representation = if input.factorized {
        WeightRepresentation::Factorized
    } else {
        WeightRepresentation::Dense
    };
    let config = ModelConfig::new(classes, FEATURES)
        .with_representation(representation)
        .with_noise_precision(0.01 + f64::from(input.noise_precision) / 100.0)
        .with_sweeps(1 + (input.sweeps % 4) as usize);

    let batch: Batch = input
        .items
        .iter()
        .take(64)
        .map(|(values, label)| {
            let values = values.iter().map(|v| f64::from(*v) / 100.0).collect();
            LabeledItem::new(Item::dense(values), *label as usize % classes)
        })
        .collect();

    let Ok(mut model) = ClassifierModel::new(config) else {
        return;
    };
    if model.train(&batch).is_err() {
        return;
    }
    if let Some(first) = batch.items().first() {
        if let Ok(prediction) = model.predict(&first.item) {
            let total: f64 = prediction.distribution.probs().iter().sum();
            assert!((total - 1.0).abs() < 1e-6);
        }
    }
});
