//! Loopback transport with scripted delivery and seeded chunking.

use std::collections::VecDeque;

use bytes::Bytes;
use porter_core::{Transport, TransportError, TransportEvent};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Splits a byte string into random-length chunks, deterministically per
/// seed.
///
/// Used to prove that frame reassembly does not depend on where the network
/// happened to cut the stream.
#[derive(Debug)]
pub struct Chunker {
    rng: ChaCha8Rng,
}

impl Chunker {
    /// Chunker with a fixed seed.
    pub fn new(seed: u64) -> Self {
        Self { rng: ChaCha8Rng::seed_from_u64(seed) }
    }

    /// Cut `bytes` into one or more non-empty chunks.
    pub fn split(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        let mut chunks = Vec::new();
        let mut rest = bytes;
        while !rest.is_empty() {
            let take = self.rng.gen_range(1..=rest.len());
            let (chunk, tail) = rest.split_at(take);
            chunks.push(chunk.to_vec());
            rest = tail;
        }
        chunks
    }
}

/// In-process byte channel.
///
/// Sends are recorded for inspection; inbound traffic and connection
/// lifecycle are scripted by the test. Nothing crosses a thread: the
/// notifications a test pushes are exactly what the next drain returns.
#[derive(Debug, Default)]
pub struct SimTransport {
    open: bool,
    sent: Vec<Vec<u8>>,
    total_sends: usize,
    inbox: VecDeque<TransportEvent>,
}

impl SimTransport {
    /// Closed transport with nothing queued.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the channel opening.
    pub fn open(&mut self) {
        self.open = true;
        self.inbox.push_back(TransportEvent::Connected);
    }

    /// Script the channel closing.
    ///
    /// Packets sent but not yet taken die with the channel; they were on a
    /// wire that no longer exists.
    pub fn close(&mut self) {
        self.open = false;
        self.sent.clear();
        self.inbox.push_back(TransportEvent::Closed);
    }

    /// Script a channel-level error notification.
    pub fn error(&mut self, message: &str) {
        self.inbox.push_back(TransportEvent::Error(message.to_owned()));
    }

    /// Script inbound bytes arriving as one chunk.
    pub fn deliver(&mut self, bytes: &[u8]) {
        self.inbox.push_back(TransportEvent::Data(Bytes::copy_from_slice(bytes)));
    }

    /// Script inbound bytes arriving cut into seeded random chunks.
    pub fn deliver_chunked(&mut self, bytes: &[u8], chunker: &mut Chunker) {
        for chunk in chunker.split(bytes) {
            self.deliver(&chunk);
        }
    }

    /// Take the packets sent since the last call.
    pub fn take_sent(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.sent)
    }

    /// Packets sent and not yet taken.
    pub fn unread_sends(&self) -> usize {
        self.sent.len()
    }

    /// Packets sent over the transport's lifetime.
    pub fn total_sends(&self) -> usize {
        self.total_sends
    }
}

impl Transport for SimTransport {
    fn send(&mut self, packet: &[u8]) -> Result<(), TransportError> {
        if !self.open {
            return Err(TransportError::NotConnected);
        }
        self.sent.push(packet.to_vec());
        self.total_sends += 1;
        Ok(())
    }

    fn drain(&mut self) -> Vec<TransportEvent> {
        self.inbox.drain(..).collect()
    }
}
