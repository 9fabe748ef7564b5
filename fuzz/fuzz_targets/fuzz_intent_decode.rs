#![no_main]
use libfuzzer_sys::fuzz_target;
use smb_traits::SilentDiagnostics;

fuzz_target!(|data: &str| {
    for intent in smb_core::intent::decode_all(data, &SilentDiagnostics) {
        assert!((0.0..=1.0).contains(&intent.confidence));
        if let Ok(line) = smb_core::intent::encode(&intent) {
            assert!(smb_core::intent::decode(&line, &SilentDiagnostics).is_some());
        }
    }
});
