//! Fuzz target: `LineDecoder::push`
//!
//! Feeds arbitrary client bytes, telnet negotiation included, and checks
//! that completed lines are bounded and free of control characters.
//!
//! cargo fuzz run fuzz_telnet_lines

#![no_main]

use libfuzzer_sys::fuzz_target;
use trex::adapters::telnet::LineDecoder;

fuzz_target!(|data: &[u8]| {
    let mut dec = LineDecoder::new();
    // Split once so state carried across pushes is exercised.
    let mid = data.len() / 2;
    dec.push(&data[..mid]);
    dec.push(&data[mid..]);

    while let Some(line) = dec.next_line() {
        assert!(line.len() <= 256, "line exceeds limit");
        assert!(line.bytes().all(|b| b == b'\t' || (b' '..=b'~').contains(&b)));
    }
});
