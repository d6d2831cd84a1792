//! FIFO request scheduler with single-in-flight wire discipline.
//!
//! The wire protocol carries no request identifier, so the channel is a
//! strict request/response rendezvous: the next response frame always belongs
//! to the request most recently sent. The scheduler enforces the invariant
//! that makes this sound — at most one request occupies the in-flight slot,
//! and the head of the queue advances only when that slot empties.
//!
//! While the transport is down, enqueued requests simply stall; the scheduler
//! never initiates a connection. A `Connected` notification drains the queue,
//! which gives a host that chooses to reconnect its pending work back without
//! this layer owning any retry policy.

use std::collections::VecDeque;

use bytes::Bytes;
use porter_proto::RequestPacket;
use tracing::debug;

use crate::{
    action::LoaderAction,
    request::{Request, RequestState},
};

/// FIFO queue plus the channel's single in-flight slot.
#[derive(Debug, Default)]
pub struct Scheduler {
    queue: VecDeque<Request>,
    in_flight: Option<Request>,
    connected: bool,
}

impl Scheduler {
    /// New scheduler with a closed channel and an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Note that the channel is open and drain the queue head if possible.
    pub fn channel_opened(&mut self) -> Vec<LoaderAction> {
        self.connected = true;
        let mut actions = Vec::new();
        self.pump(&mut actions);
        actions
    }

    /// Note that the channel closed and reject everything outstanding.
    ///
    /// Returns the rejected requests — the in-flight one first, then the
    /// queue in FIFO order — each already moved to its `Error` terminal
    /// state. The queue is left empty.
    pub fn channel_closed(&mut self) -> Vec<Request> {
        self.connected = false;
        let mut rejected: Vec<Request> = self.in_flight.take().into_iter().collect();
        rejected.extend(self.queue.drain(..));
        for request in &mut rejected {
            debug!(
                request_id = request.request_id,
                key = %request.key,
                from = ?request.state,
                "rejecting request on channel closure"
            );
            request.state = RequestState::Error;
        }
        rejected
    }

    /// Append a request to the queue and send it immediately if the wire is
    /// idle.
    pub fn enqueue(&mut self, mut request: Request) -> Vec<LoaderAction> {
        request.state = RequestState::Queued;
        debug!(request_id = request.request_id, key = %request.key, "queued");
        self.queue.push_back(request);
        let mut actions = Vec::new();
        self.pump(&mut actions);
        actions
    }

    /// Resolve the in-flight request against a completed response frame.
    ///
    /// Returns the request in its terminal state (`Completed` on success,
    /// `Error` otherwise) together with the actions that put the next queued
    /// request on the wire. Returns `None` if nothing was in flight — a
    /// response nobody asked for, which the caller discards.
    pub fn complete_in_flight(&mut self, success: bool) -> (Option<Request>, Vec<LoaderAction>) {
        let Some(mut request) = self.in_flight.take() else {
            return (None, Vec::new());
        };
        request.state = if success { RequestState::Completed } else { RequestState::Error };
        debug!(
            request_id = request.request_id,
            key = %request.key,
            state = ?request.state,
            "in-flight request resolved"
        );
        let mut actions = Vec::new();
        self.pump(&mut actions);
        (Some(request), actions)
    }

    /// Put the queue head on the wire if the slot is empty and the channel is
    /// open.
    fn pump(&mut self, actions: &mut Vec<LoaderAction>) {
        if self.in_flight.is_some() || !self.connected {
            return;
        }
        let Some(mut request) = self.queue.pop_front() else {
            return;
        };

        request.state = RequestState::Sending;
        let packet = RequestPacket::new(request.key);
        actions.push(LoaderAction::Send(Bytes::copy_from_slice(&packet.encode())));
        // Sends are fire-and-forget; the request is awaiting its response
        // the moment the write is handed to the driver.
        request.state = RequestState::Receiving;
        debug!(request_id = request.request_id, key = %request.key, "request on the wire");
        self.in_flight = Some(request);
    }

    /// Whether the channel is currently believed open.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Number of requests waiting behind the in-flight slot.
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// The request currently occupying the wire, if any.
    pub fn in_flight(&self) -> Option<&Request> {
        self.in_flight.as_ref()
    }

    /// Look up a queued or in-flight request by id.
    pub fn get(&self, request_id: u32) -> Option<&Request> {
        self.in_flight
            .iter()
            .chain(self.queue.iter())
            .find(|request| request.request_id == request_id)
    }

    /// Whether some queued or in-flight request targets `key`.
    pub fn is_key_outstanding(&self, key: porter_proto::ArchiveKey) -> bool {
        self.in_flight.iter().chain(self.queue.iter()).any(|request| request.key == key)
    }

    /// Every queued or in-flight request, in-flight first.
    pub fn outstanding(&self) -> impl Iterator<Item = &Request> {
        self.in_flight.iter().chain(self.queue.iter())
    }
}
