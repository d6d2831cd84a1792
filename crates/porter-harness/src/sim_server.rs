//! Scripted asset server.

use std::collections::HashMap;

use bytes::Bytes;
use porter_proto::{ArchiveKey, RequestPacket, ResponseFrame};

/// Status word the server answers with when it does not hold an archive.
const STATUS_NOT_FOUND: u32 = 0;

/// In-process asset server speaking the archive wire protocol.
///
/// Holds a table of archives; a request for a known key is answered with
/// status 1 and the payload, anything else with a refusal. There is no
/// network here — the test moves the bytes.
#[derive(Debug, Default)]
pub struct SimServer {
    archives: HashMap<ArchiveKey, Bytes>,
}

impl SimServer {
    /// Server with no archives.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish an archive.
    pub fn insert(&mut self, key: ArchiveKey, data: &[u8]) {
        self.archives.insert(key, Bytes::copy_from_slice(data));
    }

    /// Remove an archive, turning requests for it into refusals.
    pub fn remove(&mut self, key: ArchiveKey) {
        self.archives.remove(&key);
    }

    /// Answer one request packet with the serialized response frame.
    ///
    /// Errors if the packet is not a well-formed archive request — a sim
    /// client that emits garbage should fail its test loudly, not get a
    /// polite refusal.
    pub fn respond_to(&self, packet: &[u8]) -> porter_proto::Result<Vec<u8>> {
        let request = RequestPacket::decode(packet)?;
        let frame = match self.archives.get(&request.key()) {
            Some(data) => ResponseFrame { status: 1, data: data.clone() },
            None => ResponseFrame { status: STATUS_NOT_FOUND, data: Bytes::new() },
        };
        let mut wire = Vec::new();
        frame.encode(&mut wire);
        Ok(wire)
    }
}
