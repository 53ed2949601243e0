#![no_main]

use libfuzzer_sys::fuzz_target;
use peinfo::{analyze, Request, SliceReader};

fuzz_target!(|data: &[u8]| {
    // Full analysis: sections, imports and exports
    let _ = analyze(SliceReader::new(data), &Request::all());
});
