//! Engine-facing session: loader + store + transport under one roof.

use std::collections::VecDeque;

use porter_core::{
    ArchiveLoader, ArchiveStore, HeapRegion, LoaderAction, LoaderConfig, RequestState, Transport,
};
use porter_proto::ArchiveKey;
use tracing::warn;

/// A running archive loader wired to concrete collaborators.
///
/// The session is the single logical thread of control the core requires:
/// every entry point first drains the transport, then lets the loader react,
/// then executes the resulting actions to completion. Nothing here blocks —
/// the sandboxed engine may call [`submit`](Self::submit) and
/// [`poll`](Self::poll) on every tick of its own loop.
#[derive(Debug)]
pub struct Session<S, T> {
    loader: ArchiveLoader,
    store: S,
    transport: T,
}

impl<S: ArchiveStore, T: Transport> Session<S, T> {
    /// Session with default loader configuration.
    pub fn new(store: S, transport: T) -> Self {
        Self::with_config(LoaderConfig::default(), store, transport)
    }

    /// Session with an explicit loader configuration.
    pub fn with_config(config: LoaderConfig, store: S, transport: T) -> Self {
        Self { loader: ArchiveLoader::with_config(config), store, transport }
    }

    /// Register interest in an archive. Non-blocking; idempotent per
    /// request id until the result is consumed.
    pub fn submit(&mut self, request_id: u32, table_id: u8, archive_id: u32) {
        self.pump();
        let actions = self.loader.submit(request_id, table_id, archive_id);
        self.run(actions);
    }

    /// Check for a result and, when ready, materialize it at `dest` inside
    /// `region`.
    ///
    /// Returns the engine contract codes: `-1` unknown id, `0` not ready,
    /// `1` delivered (exactly once). A shared-region failure reports `0` —
    /// the result is retained, the destination untouched, and a later poll
    /// may still deliver.
    pub fn poll<R: HeapRegion + ?Sized>(
        &mut self,
        region: &mut R,
        dest: u32,
        request_id: u32,
    ) -> i32 {
        self.pump();
        match self.loader.poll(region, dest, request_id) {
            Ok(outcome) => outcome.code(),
            Err(error) => {
                warn!(request_id, %error, "result could not be materialized, retrying later");
                0
            }
        }
    }

    /// Drain pending transport notifications into the loader.
    ///
    /// Called implicitly by `submit` and `poll`; hosts that idle between
    /// engine ticks may also call it directly.
    pub fn pump(&mut self) {
        for event in self.transport.drain() {
            let actions = self.loader.on_transport_event(event);
            self.run(actions);
        }
    }

    /// Execute loader actions, feeding completions back until quiescent.
    fn run(&mut self, actions: Vec<LoaderAction>) {
        let mut work: VecDeque<LoaderAction> = actions.into();
        while let Some(action) = work.pop_front() {
            match action {
                LoaderAction::Send(packet) => {
                    // Fire-and-forget. A send that races the channel going
                    // down is resolved by the Closed event on the next drain.
                    if let Err(error) = self.transport.send(&packet) {
                        warn!(%error, "request packet send failed");
                    }
                }
                LoaderAction::Lookup { request_id, key } => {
                    let cached = match self.store.lookup(key) {
                        Ok(cached) => cached,
                        Err(error) => {
                            // A broken read is indistinguishable from a miss;
                            // the network path takes over.
                            warn!(request_id, %key, %error, "cache read failed, treating as miss");
                            None
                        }
                    };
                    work.extend(self.loader.cache_lookup_completed(request_id, cached));
                }
                LoaderAction::Store { key, data } => {
                    if let Err(error) = self.store.store(key, &data) {
                        warn!(%key, %error, "cache write failed, result still delivered");
                    }
                }
            }
        }
    }

    /// Whether the channel is currently believed open.
    pub fn is_connected(&self) -> bool {
        self.loader.is_connected()
    }

    /// Lifecycle state of a request, if known.
    pub fn request_state(&self, request_id: u32) -> Option<RequestState> {
        self.loader.request_state(request_id)
    }

    /// Requests waiting behind the in-flight slot.
    pub fn queue_len(&self) -> usize {
        self.loader.queue_len()
    }

    /// Whether any non-terminal request targets `key`.
    pub fn is_key_outstanding(&self, key: ArchiveKey) -> bool {
        self.loader.is_key_outstanding(key)
    }

    /// The underlying store, for maintenance (clear, stats).
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use bytes::Bytes;
    use porter_core::{HeapError, StoreError, StoreStats, TransportError, TransportEvent};
    use porter_proto::{ResponseFrame, ResultRecord};

    use super::*;

    #[derive(Default)]
    struct MemStore {
        map: HashMap<ArchiveKey, Bytes>,
        fail_writes: bool,
    }

    impl ArchiveStore for MemStore {
        fn lookup(&self, key: ArchiveKey) -> Result<Option<Bytes>, StoreError> {
            Ok(self.map.get(&key).cloned())
        }
        fn store(&mut self, key: ArchiveKey, data: &[u8]) -> Result<(), StoreError> {
            if self.fail_writes {
                return Err(StoreError::Store("disk full".into()));
            }
            self.map.insert(key, Bytes::copy_from_slice(data));
            Ok(())
        }
        fn clear(&mut self) -> Result<(), StoreError> {
            self.map.clear();
            Ok(())
        }
        fn stats(&self) -> Result<StoreStats, StoreError> {
            Ok(StoreStats { archives: self.map.len() as u64, ..StoreStats::default() })
        }
    }

    #[derive(Default)]
    struct FakeTransport {
        sent: Vec<Vec<u8>>,
        inbox: VecDeque<TransportEvent>,
    }

    impl Transport for FakeTransport {
        fn send(&mut self, packet: &[u8]) -> Result<(), TransportError> {
            self.sent.push(packet.to_vec());
            Ok(())
        }
        fn drain(&mut self) -> Vec<TransportEvent> {
            self.inbox.drain(..).collect()
        }
    }

    struct Region(Vec<u8>, usize);

    impl Region {
        fn new() -> Self {
            Self(vec![0; 4096], 64)
        }
        fn record_at(&self, dest: u32) -> ResultRecord {
            ResultRecord::decode(&self.0[dest as usize..dest as usize + ResultRecord::SIZE])
                .expect("record bytes")
        }
    }

    impl HeapRegion for Region {
        fn alloc(&mut self, len: usize) -> Option<u32> {
            let ptr = self.1;
            self.1 += len;
            (self.1 <= self.0.len()).then_some(ptr as u32)
        }
        fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), HeapError> {
            let start = offset as usize;
            self.0[start..start + bytes.len()].copy_from_slice(bytes);
            Ok(())
        }
    }

    fn wire(status: u32, data: &'static [u8]) -> TransportEvent {
        let mut bytes = Vec::new();
        ResponseFrame { status, data: Bytes::from_static(data) }.encode(&mut bytes);
        TransportEvent::Data(Bytes::from(bytes))
    }

    fn connected_session() -> Session<MemStore, FakeTransport> {
        let mut transport = FakeTransport::default();
        transport.inbox.push_back(TransportEvent::Connected);
        let mut session = Session::new(MemStore::default(), transport);
        session.pump();
        session
    }

    #[test]
    fn fetch_roundtrip_delivers_once() {
        let mut session = connected_session();
        let mut region = Region::new();

        session.submit(1, 255, 7);
        assert_eq!(session.transport.sent, vec![vec![0x01, 0xff, 0x00, 0x00, 0x00, 0x07]]);
        assert_eq!(session.poll(&mut region, 0, 1), 0);

        session.transport.inbox.push_back(wire(1, b"\xaa\xbb\xcc"));
        assert_eq!(session.poll(&mut region, 0, 1), 1);
        let record = region.record_at(0);
        assert_eq!(record.status(), 1);
        assert_eq!(record.size(), 3);

        assert_eq!(session.poll(&mut region, 0, 1), -1);
    }

    #[test]
    fn second_submit_is_served_from_cache() {
        let mut session = connected_session();
        let mut region = Region::new();

        session.submit(1, 2, 9);
        session.transport.inbox.push_back(wire(1, b"cached bytes"));
        assert_eq!(session.poll(&mut region, 0, 1), 1);

        // Same key, fresh id: no new wire traffic.
        session.submit(2, 2, 9);
        assert_eq!(session.transport.sent.len(), 1);
        assert_eq!(session.request_state(2), Some(RequestState::Cached));
        assert_eq!(session.poll(&mut region, 32, 2), 1);
    }

    #[test]
    fn cache_write_failure_is_swallowed() {
        let mut session = connected_session();
        session.store_mut().fail_writes = true;
        let mut region = Region::new();

        session.submit(1, 0, 5);
        session.transport.inbox.push_back(wire(1, b"still yours"));
        assert_eq!(session.poll(&mut region, 0, 1), 1);
        let record = region.record_at(0);
        assert_eq!(record.status(), 1);
        assert_eq!(record.size(), 11);
    }

    #[test]
    fn unknown_id_reports_not_found() {
        let mut session = connected_session();
        let mut region = Region::new();
        assert_eq!(session.poll(&mut region, 0, 99), -1);
    }
}
