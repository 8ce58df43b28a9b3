//! Fuzz target for TOML model configuration parsing.

#![no_main]

use bpm_config::{validate_model_config, ModelConfig};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(config) = ModelConfig::from_toml_str(text) {
        // a config that validates must also build a model
        if validate_model_config(&config).is_ok() && config.feature_count <= 64 {
            let _ = bpm_core::ClassifierModel::new(config);
        }
    }
});
