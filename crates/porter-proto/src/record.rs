//! Shared-memory result record.
//!
//! When a fetch resolves, the result is handed to the sandboxed engine by
//! writing a fixed 32-byte record at an engine-chosen offset in the shared
//! region. The engine validates `magic` before trusting the rest, then reads
//! the payload through `data_ptr`/`size`.
//!
//! ```text
//! [magic][request_id][table_id][archive_id][status][size][filled][data_ptr]
//! ```
//!
//! Eight 32-bit words, each big-endian regardless of the host's native byte
//! order — the engine on the other side of the region decodes them
//! byte-by-byte, so a native-endian write would be wrong on half the hosts
//! this runs on. The `zerocopy` big-endian field types make the conversion
//! part of the layout.

use zerocopy::{
    byteorder::{BigEndian, U32},
    FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
};

use crate::packet::ArchiveKey;

/// Sentinel the engine checks before reading any other record field.
pub const RECORD_MAGIC: u32 = 12_345_678;

/// Fixed-layout result record, exactly as it lives in shared memory.
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct ResultRecord {
    magic: U32<BigEndian>,
    request_id: U32<BigEndian>,
    table_id: U32<BigEndian>,
    archive_id: U32<BigEndian>,
    status: U32<BigEndian>,
    size: U32<BigEndian>,
    filled: U32<BigEndian>,
    data_ptr: U32<BigEndian>,
}

impl ResultRecord {
    /// Encoded size of a record.
    pub const SIZE: usize = 32;

    /// Record for a successful fetch whose payload was copied to `data_ptr`.
    pub fn success(request_id: u32, key: ArchiveKey, size: u32, data_ptr: u32) -> Self {
        Self::build(request_id, key, 1, size, data_ptr)
    }

    /// Record for a failed fetch: no payload, `status` zero.
    pub fn failure(request_id: u32, key: ArchiveKey) -> Self {
        Self::build(request_id, key, 0, 0, 0)
    }

    fn build(request_id: u32, key: ArchiveKey, status: u32, size: u32, data_ptr: u32) -> Self {
        Self {
            magic: U32::new(RECORD_MAGIC),
            request_id: U32::new(request_id),
            table_id: U32::new(u32::from(key.table_id)),
            archive_id: U32::new(key.archive_id),
            status: U32::new(status),
            size: U32::new(size),
            // Consumers treat `filled` as "every field of this record is
            // populated"; it is always the last notion set, never partial.
            filled: U32::new(1),
            data_ptr: U32::new(data_ptr),
        }
    }

    /// Serialized record, ready for a single all-or-nothing region write.
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out.copy_from_slice(self.as_bytes());
        out
    }

    /// Parse a record back out of region bytes (used by tests and tooling).
    pub fn decode(bytes: &[u8]) -> crate::Result<Self> {
        Self::read_from_bytes(bytes).map_err(|_| crate::ProtocolError::WrongLength {
            expected: Self::SIZE,
            actual: bytes.len(),
        })
    }

    /// Sentinel word.
    pub fn magic(&self) -> u32 {
        self.magic.get()
    }

    /// Id of the request this record answers.
    pub fn request_id(&self) -> u32 {
        self.request_id.get()
    }

    /// Archive identity the record describes.
    pub fn key(&self) -> ArchiveKey {
        ArchiveKey::new(self.table_id.get() as u8, self.archive_id.get())
    }

    /// 1 for a successful fetch, 0 for a failure.
    pub fn status(&self) -> u32 {
        self.status.get()
    }

    /// Payload length in bytes; 0 for failures and empty archives.
    pub fn size(&self) -> u32 {
        self.size.get()
    }

    /// Record-complete flag.
    pub fn filled(&self) -> u32 {
        self.filled.get()
    }

    /// Offset of the payload in the shared region; 0 when there is none.
    pub fn data_ptr(&self) -> u32 {
        self.data_ptr.get()
    }
}
