#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse and validation errors are fine; panics are not. A config that
    // validates must also build a pipeline.
    if let Ok(cfg) = smb_config::load_toml(data)
        && cfg.validate().is_ok()
    {
        let _ = smb_core::SmbPipelineBuilder::from_config(&cfg).build();
    }
});
