#![no_main]

use flaglayer::ByteSize;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|raw: &str| {
    let Ok(size) = raw.parse::<ByteSize>() else {
        return;
    };

    // Beyond 2^53 the float step loses precision.
    if size.bytes().unsigned_abs() > 1 << 53 {
        return;
    }

    // The formatted byte count parses back to the same size.
    let formatted = size.to_string();
    let reparsed: ByteSize = formatted.parse().expect("formatted size must parse");
    assert_eq!(size, reparsed);
});
