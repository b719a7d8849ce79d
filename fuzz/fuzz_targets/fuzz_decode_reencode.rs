#![no_main]
use libfuzzer_sys::fuzz_target;

use cellbag::{decode, encode, EncodeOptions};

// Any container that decodes must re-encode deterministically and decode
// again to the same root hashes.
fuzz_target!(|data: &[u8]| {
    let Ok(roots) = decode(data) else {
        return;
    };

    for options in [
        EncodeOptions::default(),
        EncodeOptions {
            with_index: true,
            with_checksum: true,
        },
    ] {
        let bytes = encode(&roots, options);
        let again = decode(&bytes).expect("re-encoded container must decode");
        assert_eq!(again.len(), roots.len());
        for (a, b) in again.iter().zip(&roots) {
            assert_eq!(a.hash(), b.hash());
        }
        assert_eq!(encode(&again, options), bytes);
    }
});
