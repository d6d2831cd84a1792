//! Transport abstraction for the archive channel.
//!
//! The core needs an ordered byte stream with fire-and-forget sends and
//! edge-triggered notifications. Production uses a tokio TCP stream
//! (`porter-client`, feature `transport`); tests use an in-process loopback
//! (`porter-harness`).
//!
//! Connection establishment is deliberately outside the trait — a TCP
//! transport connects asynchronously, a loopback is born connected — so a
//! successful connect is reported like everything else: as a
//! [`TransportEvent::Connected`] in the event stream.

use bytes::Bytes;
use thiserror::Error;

/// Notifications the transport delivers to the core.
///
/// Drivers must serialize these before feeding them in; the core is a single
/// logical thread and is never re-entered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The channel is open; queued requests may be sent.
    Connected,
    /// A chunk of response bytes arrived. Chunk boundaries carry no meaning.
    Data(Bytes),
    /// The channel closed. May happen mid-frame.
    Closed,
    /// A channel-level error was observed. The channel may still close
    /// separately; this event alone rejects nothing.
    Error(String),
}

/// Errors surfaced by a transport send.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The channel is not open.
    #[error("transport is not connected")]
    NotConnected,
    /// The write was attempted and failed.
    #[error("transport send failed: {0}")]
    Send(String),
}

/// Abstract ordered byte channel to the archive server.
///
/// Sends are fire-and-forget. Received chunks, closure, and errors surface
/// through [`drain`](Self::drain) so the caller controls exactly when the
/// core observes them.
pub trait Transport {
    /// Write a request packet to the channel.
    fn send(&mut self, packet: &[u8]) -> Result<(), TransportError>;

    /// Take every notification observed since the last drain, in order.
    fn drain(&mut self) -> Vec<TransportEvent>;
}
