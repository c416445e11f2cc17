#![no_main]

use arrival_eval::config::EvalConfig;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // Parsing and validation must reject bad input without panicking
        if let Ok(config) = EvalConfig::from_toml_str(input) {
            assert!(config.validate().is_ok());
            assert!(config.effective_workers() >= 1);
        }
    }
});
