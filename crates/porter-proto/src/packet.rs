//! Archive request packet.
//!
//! A request is 6 bytes on the wire:
//!
//! ```text
//! [request_code: u8 = 1][table_id: u8][archive_id: u32 BE]
//! ```
//!
//! There is no sequence number and no length field; the response that follows
//! on the channel belongs to this request by position alone.

use std::fmt;

use zerocopy::{
    byteorder::{BigEndian, U32},
    FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
};

use crate::errors::{ProtocolError, Result};

/// The only request code the archive channel understands.
pub const REQUEST_CODE: u8 = 1;

/// Table conventionally reserved for reference/index archives.
pub const REFERENCE_TABLE: u8 = 255;

/// Identity of an archive: a table and an id within that table.
///
/// Tables group archives; table [`REFERENCE_TABLE`] holds reference data by
/// convention, but this layer treats all tables alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArchiveKey {
    /// Table the archive belongs to.
    pub table_id: u8,
    /// Archive id within the table.
    pub archive_id: u32,
}

impl ArchiveKey {
    /// Create a key from its parts.
    pub fn new(table_id: u8, archive_id: u32) -> Self {
        Self { table_id, archive_id }
    }
}

impl fmt::Display for ArchiveKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.table_id, self.archive_id)
    }
}

/// Fixed 6-byte archive request, laid out exactly as it travels on the wire.
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct RequestPacket {
    code: u8,
    table_id: u8,
    archive_id: U32<BigEndian>,
}

impl RequestPacket {
    /// Encoded size of a request packet.
    pub const SIZE: usize = 6;

    /// Build a request for the given archive.
    pub fn new(key: ArchiveKey) -> Self {
        Self {
            code: REQUEST_CODE,
            table_id: key.table_id,
            archive_id: U32::new(key.archive_id),
        }
    }

    /// The archive this request asks for.
    pub fn key(&self) -> ArchiveKey {
        ArchiveKey::new(self.table_id, self.archive_id.get())
    }

    /// Serialized wire bytes.
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out.copy_from_slice(self.as_bytes());
        out
    }

    /// Parse a packet, validating length and request code.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let Ok(packet) = Self::read_from_bytes(bytes) else {
            return Err(ProtocolError::WrongLength { expected: Self::SIZE, actual: bytes.len() });
        };
        if packet.code != REQUEST_CODE {
            return Err(ProtocolError::UnknownRequestCode {
                code: packet.code,
                expected: REQUEST_CODE,
            });
        }
        Ok(packet)
    }
}
