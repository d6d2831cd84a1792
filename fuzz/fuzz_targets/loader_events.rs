//! Fuzz the loader with an arbitrary interleaving of engine calls and
//! transport events. No input may panic it or break single-consumption.
#![no_main]

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use porter_core::{ArchiveLoader, HeapError, HeapRegion, TransportEvent};

struct Region {
    mem: Vec<u8>,
    next: usize,
}

impl HeapRegion for Region {
    fn alloc(&mut self, len: usize) -> Option<u32> {
        if self.next + len > self.mem.len() {
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

fuzz_target!(|data: &[u8]| {
    let mut loader = ArchiveLoader::new();
    let mut region = Region { mem: vec![0; 1 << 16], next: 64 };

    let mut input = data;
    while let Some((&op, rest)) = input.split_first() {
        input = rest;
        match op % 6 {
            0 => {
                let Some((args, rest)) = input.split_first_chunk::<2>() else { break };
                input = rest;
                drop(loader.submit(u32::from(args[0]), args[1], u32::from(args[0])));
            }
            1 => {
                let Some((&id, rest)) = input.split_first() else { break };
                input = rest;
                // A miss exercises the scheduler, a hit the result table.
                let cached = (id % 2 == 0).then(|| Bytes::from_static(b"payload"));
                drop(loader.cache_lookup_completed(u32::from(id), cached));
            }
            2 => {
                let take = input.len().min(9);
                let (chunk, rest) = input.split_at(take);
                input = rest;
                drop(loader.on_transport_event(TransportEvent::Data(Bytes::copy_from_slice(
                    chunk,
                ))));
            }
            3 => {
                let Some((&id, rest)) = input.split_first() else { break };
                input = rest;
                if loader.poll(&mut region, 0, u32::from(id)) == Ok(porter_core::PollOutcome::Ready)
                {
                    // Exactly-once: a delivered id is immediately unknown.
                    assert_eq!(
                        loader.poll(&mut region, 0, u32::from(id)),
                        Ok(porter_core::PollOutcome::NotFound)
                    );
                }
            }
            4 => drop(loader.on_transport_event(TransportEvent::Connected)),
            _ => drop(loader.on_transport_event(TransportEvent::Closed)),
        }
    }
});
