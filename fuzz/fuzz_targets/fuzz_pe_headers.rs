#![no_main]

use libfuzzer_sys::fuzz_target;
use peinfo::PeHeaders;

fuzz_target!(|data: &[u8]| {
    // Header decoding must never panic, only return errors
    let _ = PeHeaders::from_slice(data);
});
