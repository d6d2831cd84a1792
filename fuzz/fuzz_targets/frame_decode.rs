//! Fuzz the response frame decoder with arbitrary bytes and arbitrary chunk
//! boundaries.
//!
//! The first input byte picks a chunk-size pattern; the rest is the stream.
//! The decoder must never panic, and frames plus retained tail must account
//! for every byte fed in.
#![no_main]

use libfuzzer_sys::fuzz_target;
use porter_proto::FrameDecoder;

fuzz_target!(|data: &[u8]| {
    let Some((&stride_byte, stream)) = data.split_first() else {
        return;
    };
    let stride = usize::from(stride_byte).max(1);

    let mut decoder = FrameDecoder::new();
    let mut accounted = 0usize;
    for chunk in stream.chunks(stride) {
        for frame in decoder.push(chunk) {
            accounted += 8 + frame.data.len();
        }
    }

    // 0, 4, or 8 header bytes of the in-progress frame are consumed out of
    // the rolling buffer; everything else must still be visible.
    let consumed = stream.len() - accounted - decoder.buffered();
    assert!(consumed <= 8);
});
