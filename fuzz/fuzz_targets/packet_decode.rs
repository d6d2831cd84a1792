//! Fuzz the request packet parser: decode must never panic, and accepted
//! packets must re-encode to the identical bytes.
#![no_main]

use libfuzzer_sys::fuzz_target;
use porter_proto::RequestPacket;

fuzz_target!(|data: &[u8]| {
    if let Ok(packet) = RequestPacket::decode(data) {
        assert_eq!(&packet.encode()[..], data);
    }
});
