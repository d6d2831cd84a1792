//! Shared-memory result handoff.
//!
//! The sandboxed engine cannot accept callbacks; the only way to give it a
//! fetched archive is to place the bytes in a memory region both sides can
//! address and describe them with a fixed-layout [`ResultRecord`] at an
//! offset the engine chose. The region itself (a WASM heap, a mapped file, a
//! plain buffer in tests) is an external collaborator behind [`HeapRegion`].
//!
//! The handoff is all-or-nothing: the payload buffer is allocated and filled
//! first, and the 32-byte record lands in a single region write only after
//! the payload is in place. Any failure leaves the destination untouched —
//! the engine never observes a half-written record.

use porter_proto::ResultRecord;
use thiserror::Error;
use tracing::debug;

use crate::request::ResolvedResult;

/// Errors surfaced while materializing a result into the shared region.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HeapError {
    /// The region could not provide a payload buffer of the requested size.
    #[error("shared region allocation of {len} bytes refused")]
    Alloc {
        /// Bytes requested.
        len: usize,
    },
    /// A region write fell outside the addressable range.
    #[error("shared region write of {len} bytes at offset {offset} out of bounds")]
    OutOfBounds {
        /// Destination offset of the write.
        offset: u32,
        /// Length of the write.
        len: usize,
    },
}

/// A memory region shared with the sandboxed engine.
///
/// Offsets are 32-bit because that is the width of the record's pointer
/// field; offset 0 is reserved as "no payload" and must never be returned by
/// [`alloc`](Self::alloc).
pub trait HeapRegion {
    /// Obtain a buffer of `len` bytes inside the region.
    ///
    /// Returns the buffer's offset, or `None` when the region is exhausted.
    fn alloc(&mut self, len: usize) -> Option<u32>;

    /// Copy `bytes` into the region at `offset`.
    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), HeapError>;
}

/// Materialize a resolved result at `dest` inside the region.
///
/// Successful results get their payload copied into a freshly allocated
/// buffer and a record pointing at it; failed results get a record with
/// status 0 and no payload, and perform no allocation at all. The record's
/// multi-byte fields are written big-endian field-by-field regardless of the
/// host's native byte order.
pub fn publish<R: HeapRegion + ?Sized>(
    region: &mut R,
    dest: u32,
    request_id: u32,
    result: &ResolvedResult,
) -> Result<(), HeapError> {
    let record = match (result.succeeded(), result.data.as_ref()) {
        (true, Some(data)) if !data.is_empty() => {
            let ptr = region.alloc(data.len()).ok_or(HeapError::Alloc { len: data.len() })?;
            region.write(ptr, data)?;
            ResultRecord::success(request_id, result.key, data.len() as u32, ptr)
        }
        (true, _) => ResultRecord::success(request_id, result.key, 0, 0),
        (false, _) => ResultRecord::failure(request_id, result.key),
    };

    region.write(dest, &record.encode())?;
    debug!(
        request_id,
        key = %result.key,
        status = record.status(),
        size = record.size(),
        "result published to shared region"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use porter_proto::{ArchiveKey, RECORD_MAGIC};

    use super::*;
    use crate::request::RequestState;

    /// Minimal region: a flat buffer with a bump allocator. Offset 0 is kept
    /// unusable so pointers are always nonzero.
    struct TestRegion {
        mem: Vec<u8>,
        next: usize,
        limit: usize,
    }

    impl TestRegion {
        fn new(limit: usize) -> Self {
            Self { mem: vec![0; limit], next: 64, limit }
        }

        fn record_at(&self, dest: u32) -> ResultRecord {
            ResultRecord::decode(&self.mem[dest as usize..dest as usize + ResultRecord::SIZE])
                .expect("record bytes")
        }
    }

    impl HeapRegion for TestRegion {
        fn alloc(&mut self, len: usize) -> Option<u32> {
            if self.next + len > self.limit {
                return None;
            }
            let ptr = self.next as u32;
            self.next += len;
            Some(ptr)
        }

        fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), HeapError> {
            let start = offset as usize;
            let end = start + bytes.len();
            if end > self.mem.len() {
                return Err(HeapError::OutOfBounds { offset, len: bytes.len() });
            }
            self.mem[start..end].copy_from_slice(bytes);
            Ok(())
        }
    }

    fn fetched(key: ArchiveKey, data: &'static [u8]) -> ResolvedResult {
        ResolvedResult {
            key,
            state: RequestState::Completed,
            data: Some(Bytes::from_static(data)),
        }
    }

    #[test]
    fn success_writes_payload_then_record() {
        let mut region = TestRegion::new(4096);
        let result = fetched(ArchiveKey::new(255, 7), b"\xaa\xbb\xcc");

        publish(&mut region, 0, 1, &result).expect("publish succeeds");

        let record = region.record_at(0);
        assert_eq!(record.magic(), RECORD_MAGIC);
        assert_eq!(record.request_id(), 1);
        assert_eq!(record.key(), ArchiveKey::new(255, 7));
        assert_eq!(record.status(), 1);
        assert_eq!(record.size(), 3);
        assert_eq!(record.filled(), 1);
        let ptr = record.data_ptr() as usize;
        assert_eq!(&region.mem[ptr..ptr + 3], b"\xaa\xbb\xcc");
    }

    #[test]
    fn empty_payload_skips_allocation() {
        let mut region = TestRegion::new(256);
        let before = region.next;
        let result = fetched(ArchiveKey::new(1, 2), b"");

        publish(&mut region, 32, 5, &result).expect("publish succeeds");

        assert_eq!(region.next, before, "no allocation for empty payload");
        let record = region.record_at(32);
        assert_eq!(record.status(), 1);
        assert_eq!(record.size(), 0);
        assert_eq!(record.data_ptr(), 0);
    }

    #[test]
    fn failure_record_has_no_payload() {
        let mut region = TestRegion::new(256);
        let result =
            ResolvedResult { key: ArchiveKey::new(9, 9), state: RequestState::Error, data: None };

        publish(&mut region, 0, 12, &result).expect("publish succeeds");

        let record = region.record_at(0);
        assert_eq!(record.status(), 0);
        assert_eq!(record.size(), 0);
        assert_eq!(record.data_ptr(), 0);
        assert_eq!(record.filled(), 1);
    }

    #[test]
    fn exhausted_region_leaves_destination_untouched() {
        let mut region = TestRegion::new(128);
        let result = fetched(ArchiveKey::new(1, 1), &[0x55; 512]);

        let err = publish(&mut region, 0, 3, &result).unwrap_err();
        assert_eq!(err, HeapError::Alloc { len: 512 });
        assert!(region.mem.iter().all(|&b| b == 0), "no partial record written");
    }
}
