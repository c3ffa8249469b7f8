//! Fuzz target: `protocol::decode`
//!
//! Arbitrary bytes must never panic the decoder. Anything it accepts must
//! re-encode to the identical frame.
//!
//! cargo fuzz run fuzz_decode

#![no_main]

use libfuzzer_sys::fuzz_target;
use trex::protocol::{Encoder, decode};

fuzz_target!(|data: &[u8]| {
    let Ok((hdr, msg)) = decode(data) else {
        return;
    };
    assert_eq!(hdr.msg_type, msg.msg_type());

    // Flags are reserved and always sent as zero.
    if hdr.flags != 0 {
        return;
    }
    let mut enc = Encoder::with_seq(hdr.src_station_id, hdr.seq);
    let frame = enc.encode(&msg).expect("decoded message re-encodes");
    assert_eq!(&frame[..], data, "re-encoded frame differs");
});
