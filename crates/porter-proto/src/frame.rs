//! Response framing.
//!
//! A response is `[status: u32 BE][size: u32 BE][data: size bytes]`. The
//! transport delivers bytes in whatever chunks it likes: one data event may
//! hold a fraction of a field, a whole frame, or several frames back to back.
//! [`FrameDecoder`] reassembles the stream into discrete [`ResponseFrame`]s
//! without ever dropping bytes of an incomplete field.
//!
//! The `size` field is trusted as-is. A corrupt or hostile length is not
//! rejected here; the decoder simply keeps buffering until that many bytes
//! arrive, which for a garbage length means waiting forever.

use bytes::{Buf, Bytes, BytesMut};

/// Status word denoting a successful fetch.
pub const STATUS_OK: u32 = 1;

/// One complete `(status, data)` unit reassembled from the response stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFrame {
    /// Server status word; [`STATUS_OK`] on success.
    pub status: u32,
    /// Archive payload. Empty when the frame carried `size = 0`.
    pub data: Bytes,
}

impl ResponseFrame {
    /// Whether the server reported success.
    pub fn is_success(&self) -> bool {
        self.status == STATUS_OK
    }

    /// Serialize the frame into `buf` as it would appear on the wire.
    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.status.to_be_bytes());
        buf.extend_from_slice(&(self.data.len() as u32).to_be_bytes());
        buf.extend_from_slice(&self.data);
    }
}

/// Decoder state: which field of the current frame is being read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    ReadingStatus,
    ReadingSize { status: u32 },
    ReadingData { status: u32, size: usize },
}

/// Incremental response parser.
///
/// Feed it raw transport chunks with [`push`](Self::push); it returns every
/// frame those bytes complete. Between calls it holds only the unconsumed
/// tail of the stream.
#[derive(Debug)]
pub struct FrameDecoder {
    buf: BytesMut,
    state: DecodeState,
}

impl FrameDecoder {
    /// New decoder positioned at a frame boundary.
    pub fn new() -> Self {
        Self { buf: BytesMut::new(), state: DecodeState::ReadingStatus }
    }

    /// Consume one transport chunk and return the frames it completed.
    ///
    /// Returns zero frames when the chunk only extends a partial field, and
    /// several when the chunk spans multiple responses.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<ResponseFrame> {
        self.buf.extend_from_slice(chunk);

        let mut frames = Vec::new();
        loop {
            match self.state {
                DecodeState::ReadingStatus => {
                    if self.buf.len() < 4 {
                        return frames;
                    }
                    let status = self.buf.get_u32();
                    self.state = DecodeState::ReadingSize { status };
                }
                DecodeState::ReadingSize { status } => {
                    if self.buf.len() < 4 {
                        return frames;
                    }
                    let size = self.buf.get_u32() as usize;
                    if size == 0 {
                        // Data phase skipped entirely; the frame is complete.
                        frames.push(ResponseFrame { status, data: Bytes::new() });
                        self.state = DecodeState::ReadingStatus;
                    } else {
                        self.state = DecodeState::ReadingData { status, size };
                    }
                }
                DecodeState::ReadingData { status, size } => {
                    if self.buf.len() < size {
                        return frames;
                    }
                    let data = self.buf.split_to(size).freeze();
                    frames.push(ResponseFrame { status, data });
                    self.state = DecodeState::ReadingStatus;
                }
            }
        }
    }

    /// Discard any partially read frame and return to the status field.
    ///
    /// Used when the channel is torn down mid-frame; leftover bytes belong to
    /// a response that will never finish.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.state = DecodeState::ReadingStatus;
    }

    /// Bytes currently buffered for the unfinished frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// True when the decoder sits exactly between frames.
    pub fn at_boundary(&self) -> bool {
        self.state == DecodeState::ReadingStatus && self.buf.is_empty()
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}
