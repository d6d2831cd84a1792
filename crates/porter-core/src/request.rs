//! Request lifecycle states and resolved results.

use bytes::Bytes;
use porter_proto::ArchiveKey;

/// Lifecycle of an archive request.
///
/// Linear except for the cache shortcut:
///
/// ```text
/// Pending ──> Queued ──> Sending ──> Receiving ──> Completed | Error
///    │
///    └──────────────────────────────────────────> Cached
/// ```
///
/// `Cached`, `Completed`, and `Error` are terminal; no transition ever
/// leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// Submitted; cache lookup outstanding.
    Pending,
    /// Cache missed; waiting in the scheduler queue.
    Queued,
    /// Occupies the in-flight slot; request packet being written.
    Sending,
    /// Packet sent; the next response frame on the channel belongs to it.
    Receiving,
    /// Resolved from the network.
    Completed,
    /// Resolved as a failure (server status, or rejected by closure).
    Error,
    /// Resolved from the local store without touching the wire.
    Cached,
}

impl RequestState {
    /// Whether the state is terminal.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error | Self::Cached)
    }

    /// Whether the request occupies the channel's single wire slot.
    pub fn is_in_flight(self) -> bool {
        matches!(self, Self::Sending | Self::Receiving)
    }
}

/// One tracked archive request.
#[derive(Debug, Clone)]
pub struct Request {
    /// Caller-supplied id, unique among outstanding requests.
    pub request_id: u32,
    /// Archive being fetched.
    pub key: ArchiveKey,
    /// Current lifecycle state.
    pub state: RequestState,
    /// Monotonic admission sequence; preserves FIFO order for diagnostics.
    pub enqueued_at: u64,
}

/// Terminal outcome of a request, held until `poll` consumes it.
#[derive(Debug, Clone)]
pub struct ResolvedResult {
    /// Archive the result is for.
    pub key: ArchiveKey,
    /// Terminal state the request reached (`Cached`, `Completed`, `Error`).
    pub state: RequestState,
    /// Fetched bytes; `None` for failures.
    pub data: Option<Bytes>,
}

impl ResolvedResult {
    /// Whether the archive was obtained (from cache or network).
    pub fn succeeded(&self) -> bool {
        matches!(self.state, RequestState::Cached | RequestState::Completed)
    }
}
