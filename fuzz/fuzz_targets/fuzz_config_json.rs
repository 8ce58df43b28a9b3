//! Fuzz target for JSON model configuration parsing.
//!
//! Parsing and validation must return errors, never panic.

#![no_main]

use bpm_config::{validate_model_config, ModelConfig};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(config) = ModelConfig::from_json_str(text) {
        let _ = validate_model_config(&config);
    }
});
