//! Fuzz target for item deserialization and validation.
//!
//! Arbitrary JSON is decoded as a batch; validation must either accept it
//! or report a dimension error without panicking.

#![no_main]

use bpm_common::Batch;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(batch) = serde_json::from_slice::<Batch>(data) else {
        return;
    };
    if batch.validate(4, 16).is_ok() {
        for labeled in batch.items() {
            let view = labeled.item.features();
            assert_eq!(view.indices.len(), view.values.len());
            assert!(view.indices.iter().all(|i| *i < 16));
        }
    }
});
