#![no_main]
use libfuzzer_sys::fuzz_target;

// Untrusted container bytes must produce either roots or a typed error,
// never a panic.
fuzz_target!(|data: &[u8]| {
    let _ = cellbag::decode(data);
});
