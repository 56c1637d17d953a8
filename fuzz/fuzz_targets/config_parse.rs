#![no_main]

use libfuzzer_sys::fuzz_target;
use steptrace_engine::TracerConfig;

const MAX_DOC_BYTES: usize = 4096;

fuzz_target!(|data: &[u8]| {
    let capped = &data[..data.len().min(MAX_DOC_BYTES)];
    let text = String::from_utf8_lossy(capped);
    // Parsing must never panic; rejection is fine.
    let _ = TracerConfig::from_toml_str(&text);
});
