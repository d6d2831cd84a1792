//! Engine-facing archive loader façade.
//!
//! Ties the pieces together: cache-first resolution, the scheduler's wire
//! discipline, response reassembly, and the poll-until-ready contract the
//! sandboxed engine consumes. The engine has exactly two entry points —
//! [`submit`](ArchiveLoader::submit) and [`poll`](ArchiveLoader::poll) — and
//! both are non-blocking, safe to call on every tick of its execution loop.
//!
//! Results are delivered exactly once: a successful `poll` consumes the
//! entry, and the id becomes unknown again. That single-consumption rule is
//! load-bearing — polling is the engine's only completion signal, so a
//! result that could be observed twice would be indistinguishable from a new
//! one.

use std::collections::{HashMap, VecDeque};

use bytes::Bytes;
use porter_proto::{ArchiveKey, FrameDecoder, ResponseFrame};
use tracing::{debug, warn};

use crate::{
    action::LoaderAction,
    heap::{self, HeapError, HeapRegion},
    request::{Request, RequestState, ResolvedResult},
    scheduler::Scheduler,
    transport::TransportEvent,
};

/// Tuning knobs for the loader.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Maximum unconsumed results retained. When the table outgrows this
    /// bound the oldest entries are dropped, and a later `poll` for them
    /// reports `NotFound`.
    pub completed_capacity: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self { completed_capacity: 100 }
    }
}

/// What `poll` observed for a request id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The id is unknown (never submitted, already consumed, rejected, or
    /// evicted).
    NotFound,
    /// The request exists but has not reached a terminal state.
    NotReady,
    /// The result was materialized into the shared region and consumed.
    Ready,
}

impl PollOutcome {
    /// The engine-facing status code: `-1`, `0`, or `1`.
    pub fn code(self) -> i32 {
        match self {
            Self::NotFound => -1,
            Self::NotReady => 0,
            Self::Ready => 1,
        }
    }
}

/// Archive loader façade.
///
/// Owns the pending table, the scheduler, the frame decoder, and the
/// unconsumed-result table. Single logical thread of control; drivers must
/// not re-enter it while an event is being processed.
#[derive(Debug, Default)]
pub struct ArchiveLoader {
    config: LoaderConfig,
    scheduler: Scheduler,
    decoder: FrameDecoder,
    /// Requests whose cache lookup is still outstanding.
    pending: HashMap<u32, Request>,
    /// Terminal results awaiting consumption, plus their insertion order.
    results: HashMap<u32, ResolvedResult>,
    result_order: VecDeque<u32>,
    seq: u64,
}

impl ArchiveLoader {
    /// Loader with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loader with an explicit configuration.
    pub fn with_config(config: LoaderConfig) -> Self {
        Self { config, ..Self::default() }
    }

    /// Register interest in an archive.
    ///
    /// Idempotent: a request id that is already pending, queued, in flight,
    /// or resolved-but-unconsumed makes this a no-op — it never
    /// double-enqueues, double-sends, or clobbers an undelivered result. The
    /// id becomes reusable only after `poll` consumes it.
    pub fn submit(&mut self, request_id: u32, table_id: u8, archive_id: u32) -> Vec<LoaderAction> {
        if self.pending.contains_key(&request_id)
            || self.scheduler.get(request_id).is_some()
            || self.results.contains_key(&request_id)
        {
            warn!(request_id, "submit ignored: request id already tracked");
            return Vec::new();
        }

        let key = ArchiveKey::new(table_id, archive_id);
        self.seq += 1;
        let request =
            Request { request_id, key, state: RequestState::Pending, enqueued_at: self.seq };
        debug!(request_id, %key, "submitted, cache lookup first");
        self.pending.insert(request_id, request);
        vec![LoaderAction::Lookup { request_id, key }]
    }

    /// Feed back the outcome of a [`LoaderAction::Lookup`].
    ///
    /// `Some` short-circuits the request to its `Cached` terminal state with
    /// zero wire traffic. `None` (a miss — which is also how drivers report
    /// a store read failure) hands the request to the scheduler.
    pub fn cache_lookup_completed(
        &mut self,
        request_id: u32,
        cached: Option<Bytes>,
    ) -> Vec<LoaderAction> {
        let Some(mut request) = self.pending.remove(&request_id) else {
            warn!(request_id, "cache completion for an unknown request");
            return Vec::new();
        };

        match cached {
            Some(data) => {
                debug!(request_id, key = %request.key, size = data.len(), "cache hit");
                request.state = RequestState::Cached;
                self.record_result(
                    request_id,
                    ResolvedResult {
                        key: request.key,
                        state: RequestState::Cached,
                        data: Some(data),
                    },
                );
                Vec::new()
            }
            None => {
                debug!(request_id, key = %request.key, "cache miss");
                self.scheduler.enqueue(request)
            }
        }
    }

    /// Process one transport notification.
    pub fn on_transport_event(&mut self, event: TransportEvent) -> Vec<LoaderAction> {
        match event {
            TransportEvent::Connected => {
                debug!("channel open");
                self.scheduler.channel_opened()
            }
            TransportEvent::Data(chunk) => {
                let frames = self.decoder.push(&chunk);
                let mut actions = Vec::new();
                for frame in frames {
                    actions.extend(self.handle_frame(frame));
                }
                actions
            }
            TransportEvent::Closed => {
                let rejected = self.scheduler.channel_closed();
                if !rejected.is_empty() {
                    warn!(count = rejected.len(), "channel closed, outstanding requests dropped");
                }
                // Bytes of a half-received response belong to a request that
                // no longer exists.
                self.decoder.reset();
                Vec::new()
            }
            TransportEvent::Error(message) => {
                warn!(%message, "transport error");
                Vec::new()
            }
        }
    }

    /// Resolve the in-flight request against a reassembled frame.
    fn handle_frame(&mut self, frame: ResponseFrame) -> Vec<LoaderAction> {
        let success = frame.is_success();
        let (done, pump) = self.scheduler.complete_in_flight(success);
        let Some(request) = done else {
            warn!(status = frame.status, "response frame with nothing in flight, discarded");
            return Vec::new();
        };

        let mut actions = Vec::new();
        if success {
            // Persist before the next request goes out; the write is
            // best-effort and its failure never reaches the engine.
            actions.push(LoaderAction::Store { key: request.key, data: frame.data.clone() });
            self.record_result(
                request.request_id,
                ResolvedResult {
                    key: request.key,
                    state: RequestState::Completed,
                    data: Some(frame.data),
                },
            );
        } else {
            warn!(
                request_id = request.request_id,
                key = %request.key,
                status = frame.status,
                "server refused archive"
            );
            self.record_result(
                request.request_id,
                ResolvedResult { key: request.key, state: RequestState::Error, data: None },
            );
        }
        actions.extend(pump);
        actions
    }

    /// Check for, and on success consume, the result of a request.
    ///
    /// `Ready` means the result record (and payload, if any) now sits in the
    /// region and the entry is gone; asking again yields `NotFound`. A heap
    /// failure leaves the entry in place — the destination is untouched and
    /// the caller may poll again later.
    pub fn poll<R: HeapRegion + ?Sized>(
        &mut self,
        region: &mut R,
        dest: u32,
        request_id: u32,
    ) -> Result<PollOutcome, HeapError> {
        if let Some(result) = self.results.get(&request_id) {
            heap::publish(region, dest, request_id, result)?;
            self.results.remove(&request_id);
            self.result_order.retain(|&id| id != request_id);
            debug!(request_id, "result consumed");
            return Ok(PollOutcome::Ready);
        }
        if self.pending.contains_key(&request_id) || self.scheduler.get(request_id).is_some() {
            return Ok(PollOutcome::NotReady);
        }
        Ok(PollOutcome::NotFound)
    }

    /// Record a terminal result, evicting the oldest unconsumed entries past
    /// the configured bound.
    fn record_result(&mut self, request_id: u32, result: ResolvedResult) {
        self.results.insert(request_id, result);
        self.result_order.push_back(request_id);
        while self.result_order.len() > self.config.completed_capacity {
            if let Some(oldest) = self.result_order.pop_front() {
                if self.results.remove(&oldest).is_some() {
                    warn!(request_id = oldest, "unconsumed result evicted");
                }
            }
        }
    }

    /// Lifecycle state of a request, if the id is known.
    pub fn request_state(&self, request_id: u32) -> Option<RequestState> {
        if let Some(request) = self.pending.get(&request_id) {
            return Some(request.state);
        }
        if let Some(request) = self.scheduler.get(request_id) {
            return Some(request.state);
        }
        self.results.get(&request_id).map(|result| result.state)
    }

    /// Whether the channel is currently believed open.
    pub fn is_connected(&self) -> bool {
        self.scheduler.is_connected()
    }

    /// Requests waiting behind the in-flight slot.
    pub fn queue_len(&self) -> usize {
        self.scheduler.queue_len()
    }

    /// Unconsumed results currently held.
    pub fn results_len(&self) -> usize {
        self.results.len()
    }

    /// Id, key, and state of the request on the wire, if any.
    pub fn in_flight(&self) -> Option<(u32, ArchiveKey, RequestState)> {
        self.scheduler.in_flight().map(|r| (r.request_id, r.key, r.state))
    }

    /// Whether any non-terminal request targets `key`.
    pub fn is_key_outstanding(&self, key: ArchiveKey) -> bool {
        self.pending.values().any(|r| r.key == key) || self.scheduler.is_key_outstanding(key)
    }

    /// Every non-terminal request, in admission order.
    pub fn outstanding(&self) -> Vec<(u32, ArchiveKey, RequestState)> {
        let mut all: Vec<&Request> =
            self.pending.values().chain(self.scheduler.outstanding()).collect();
        all.sort_by_key(|r| r.enqueued_at);
        all.iter().map(|r| (r.request_id, r.key, r.state)).collect()
    }
}

#[cfg(test)]
mod tests {
    use porter_proto::{ResultRecord, RECORD_MAGIC};

    use super::*;

    /// Flat test region with a bump allocator; offsets below 64 are reserved
    /// for records so payload pointers are always nonzero.
    struct TestRegion {
        mem: Vec<u8>,
        next: usize,
    }

    impl TestRegion {
        fn new() -> Self {
            Self { mem: vec![0; 4096], next: 64 }
        }

        fn record_at(&self, dest: u32) -> ResultRecord {
            ResultRecord::decode(&self.mem[dest as usize..dest as usize + ResultRecord::SIZE])
                .expect("record bytes")
        }

        fn payload(&self, record: &ResultRecord) -> &[u8] {
            let start = record.data_ptr() as usize;
            &self.mem[start..start + record.size() as usize]
        }
    }

    impl HeapRegion for TestRegion {
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

    fn connected_loader() -> ArchiveLoader {
        let mut loader = ArchiveLoader::new();
        loader.on_transport_event(TransportEvent::Connected);
        loader
    }

    fn sends(actions: &[LoaderAction]) -> usize {
        actions.iter().filter(|a| matches!(a, LoaderAction::Send(_))).count()
    }

    fn response(status: u32, data: &'static [u8]) -> TransportEvent {
        let frame = ResponseFrame { status, data: Bytes::from_static(data) };
        let mut wire = Vec::new();
        frame.encode(&mut wire);
        TransportEvent::Data(Bytes::from(wire))
    }

    #[test]
    fn cache_hit_never_touches_the_wire() {
        let mut loader = connected_loader();

        let actions = loader.submit(1, 255, 7);
        assert_eq!(
            actions,
            vec![LoaderAction::Lookup { request_id: 1, key: ArchiveKey::new(255, 7) }]
        );
        assert_eq!(loader.request_state(1), Some(RequestState::Pending));

        let actions = loader.cache_lookup_completed(1, Some(Bytes::from_static(b"blob")));
        assert!(actions.is_empty());
        assert_eq!(loader.request_state(1), Some(RequestState::Cached));
        assert_eq!(loader.queue_len(), 0);
        assert!(loader.in_flight().is_none());
    }

    #[test]
    fn cache_miss_goes_to_scheduler() {
        let mut loader = connected_loader();
        loader.submit(1, 255, 7);
        let actions = loader.cache_lookup_completed(1, None);
        assert_eq!(sends(&actions), 1);
        assert_eq!(loader.request_state(1), Some(RequestState::Receiving));
    }

    #[test]
    fn duplicate_submit_is_a_no_op_in_every_phase() {
        let mut loader = connected_loader();

        // Pending.
        loader.submit(1, 0, 1);
        assert!(loader.submit(1, 0, 1).is_empty());

        // In flight.
        loader.cache_lookup_completed(1, None);
        assert!(loader.submit(1, 0, 1).is_empty());

        // Resolved but unconsumed: still a no-op, the result survives.
        loader.on_transport_event(response(1, b"data"));
        assert!(loader.submit(1, 0, 1).is_empty());
        assert_eq!(loader.request_state(1), Some(RequestState::Completed));
    }

    #[test]
    fn successful_fetch_stores_and_resolves() {
        let mut loader = connected_loader();
        loader.submit(1, 2, 30);
        loader.cache_lookup_completed(1, None);

        let actions = loader.on_transport_event(response(1, b"\xaa\xbb\xcc"));
        assert!(matches!(
            actions[0],
            LoaderAction::Store { key, ref data }
                if key == ArchiveKey::new(2, 30) && data.as_ref() == b"\xaa\xbb\xcc"
        ));
        assert_eq!(loader.request_state(1), Some(RequestState::Completed));
    }

    #[test]
    fn server_error_resolves_as_failure_without_store() {
        let mut loader = connected_loader();
        loader.submit(1, 2, 30);
        loader.cache_lookup_completed(1, None);

        let actions = loader.on_transport_event(response(0, b""));
        assert!(actions.is_empty());
        assert_eq!(loader.request_state(1), Some(RequestState::Error));

        // The failure is still delivered through poll, exactly once.
        let mut region = TestRegion::new();
        assert_eq!(loader.poll(&mut region, 0, 1), Ok(PollOutcome::Ready));
        let record = region.record_at(0);
        assert_eq!(record.status(), 0);
        assert_eq!(record.size(), 0);
        assert_eq!(loader.poll(&mut region, 0, 1), Ok(PollOutcome::NotFound));
    }

    #[test]
    fn poll_contract() {
        let mut loader = connected_loader();
        let mut region = TestRegion::new();

        assert_eq!(loader.poll(&mut region, 0, 42), Ok(PollOutcome::NotFound));

        loader.submit(42, 255, 7);
        assert_eq!(loader.poll(&mut region, 0, 42), Ok(PollOutcome::NotReady));
        loader.cache_lookup_completed(42, None);
        assert_eq!(loader.poll(&mut region, 0, 42), Ok(PollOutcome::NotReady));

        loader.on_transport_event(response(1, b"\x01\x02\x03"));
        assert_eq!(loader.poll(&mut region, 0, 42), Ok(PollOutcome::Ready));

        let record = region.record_at(0);
        assert_eq!(record.magic(), RECORD_MAGIC);
        assert_eq!(record.request_id(), 42);
        assert_eq!(record.status(), 1);
        assert_eq!(region.payload(&record), b"\x01\x02\x03");

        assert_eq!(loader.poll(&mut region, 0, 42), Ok(PollOutcome::NotFound));
    }

    #[test]
    fn heap_exhaustion_retains_the_result() {
        struct NoRoom;
        impl HeapRegion for NoRoom {
            fn alloc(&mut self, _len: usize) -> Option<u32> {
                None
            }
            fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), HeapError> {
                Err(HeapError::OutOfBounds { offset, len: bytes.len() })
            }
        }

        let mut loader = connected_loader();
        loader.submit(1, 0, 1);
        loader.cache_lookup_completed(1, None);
        loader.on_transport_event(response(1, b"payload"));

        let mut cramped = NoRoom;
        assert_eq!(loader.poll(&mut cramped, 0, 1), Err(HeapError::Alloc { len: 7 }));

        // Entry survived; a region with room delivers it.
        let mut region = TestRegion::new();
        assert_eq!(loader.poll(&mut region, 0, 1), Ok(PollOutcome::Ready));
    }

    #[test]
    fn closure_destroys_outstanding_requests() {
        let mut loader = connected_loader();
        for id in 1..=3 {
            loader.submit(id, 0, id);
            loader.cache_lookup_completed(id, None);
        }
        assert!(loader.in_flight().is_some());
        assert_eq!(loader.queue_len(), 2);

        loader.on_transport_event(TransportEvent::Closed);
        assert_eq!(loader.queue_len(), 0);
        assert!(loader.in_flight().is_none());
        let mut region = TestRegion::new();
        for id in 1..=3 {
            assert_eq!(loader.poll(&mut region, 0, id), Ok(PollOutcome::NotFound));
        }
    }

    #[test]
    fn pending_lookup_survives_closure_and_stalls_on_miss() {
        let mut loader = connected_loader();
        loader.submit(1, 0, 1);
        loader.on_transport_event(TransportEvent::Closed);

        // The cache may still answer; a miss parks the request in the queue.
        let actions = loader.cache_lookup_completed(1, None);
        assert_eq!(sends(&actions), 0);
        assert_eq!(loader.request_state(1), Some(RequestState::Queued));

        // Reconnection drains it.
        let actions = loader.on_transport_event(TransportEvent::Connected);
        assert_eq!(sends(&actions), 1);
        assert_eq!(loader.request_state(1), Some(RequestState::Receiving));
    }

    #[test]
    fn orphan_data_is_discarded() {
        let mut loader = connected_loader();
        let actions = loader.on_transport_event(response(1, b"nobody asked"));
        assert!(actions.is_empty());
    }

    #[test]
    fn result_table_bound_evicts_oldest() {
        let mut loader = ArchiveLoader::with_config(LoaderConfig { completed_capacity: 2 });
        loader.on_transport_event(TransportEvent::Connected);

        for id in 1..=3 {
            loader.submit(id, 0, id);
            loader.cache_lookup_completed(id, Some(Bytes::from_static(b"x")));
        }

        assert_eq!(loader.results_len(), 2);
        let mut region = TestRegion::new();
        assert_eq!(loader.poll(&mut region, 0, 1), Ok(PollOutcome::NotFound));
        assert_eq!(loader.poll(&mut region, 0, 2), Ok(PollOutcome::Ready));
        assert_eq!(loader.poll(&mut region, 32, 3), Ok(PollOutcome::Ready));
    }

    #[test]
    fn diagnostics_track_admission_order() {
        let mut loader = connected_loader();
        loader.submit(5, 1, 50);
        loader.submit(6, 1, 60);
        loader.cache_lookup_completed(5, None);

        let outstanding = loader.outstanding();
        assert_eq!(outstanding.len(), 2);
        assert_eq!(outstanding[0], (5, ArchiveKey::new(1, 50), RequestState::Receiving));
        assert_eq!(outstanding[1], (6, ArchiveKey::new(1, 60), RequestState::Pending));
        assert!(loader.is_key_outstanding(ArchiveKey::new(1, 60)));
        assert!(!loader.is_key_outstanding(ArchiveKey::new(1, 70)));
    }

    #[test]
    fn chunked_response_resolves_once_complete() {
        let mut loader = connected_loader();
        loader.submit(1, 255, 7);
        loader.cache_lookup_completed(1, None);

        let frame = ResponseFrame { status: 1, data: Bytes::from_static(b"\xaa\xbb\xcc") };
        let mut wire = Vec::new();
        frame.encode(&mut wire);
        for byte in wire {
            loader.on_transport_event(TransportEvent::Data(Bytes::copy_from_slice(&[byte])));
        }
        assert_eq!(loader.request_state(1), Some(RequestState::Completed));
    }
}
