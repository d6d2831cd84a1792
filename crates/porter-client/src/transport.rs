//! TCP byte-stream transport for the archive channel.
//!
//! The core consumes transport notifications synchronously on the engine's
//! tick, but the socket lives in tokio. The bridge is a pair of unbounded
//! channels: a reader task forwards every received chunk (and the eventual
//! closure) into the event queue the session drains, and sends go through a
//! writer task so [`Transport::send`] never blocks.

use bytes::Bytes;
use porter_core::{Transport, TransportError, TransportEvent};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    sync::mpsc,
};
use tracing::debug;

const READ_BUFFER: usize = 64 * 1024;

/// Archive channel over a TCP stream.
///
/// Dropping the transport drops both channel ends, which stops the writer
/// task and lets the connection close.
#[derive(Debug)]
pub struct TcpTransport {
    events: mpsc::UnboundedReceiver<TransportEvent>,
    outbound: mpsc::UnboundedSender<Bytes>,
}

impl TcpTransport {
    /// Connect to the archive server.
    ///
    /// The returned transport already carries a [`TransportEvent::Connected`]
    /// notification; the first drain delivers it to the loader and unparks
    /// any queued requests.
    pub async fn connect(addr: &str) -> std::io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        // Request packets are 6 bytes; waiting to coalesce them only adds
        // latency to a channel that is idle between requests.
        stream.set_nodelay(true)?;
        debug!(addr, "archive channel connected");

        let (read_half, write_half) = stream.into_split();
        let (event_tx, events) = mpsc::unbounded_channel();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();

        // The session may not drain before the socket starts producing;
        // Connected must be first in the queue regardless.
        let _ = event_tx.send(TransportEvent::Connected);

        tokio::spawn(read_loop(read_half, event_tx.clone()));
        tokio::spawn(write_loop(write_half, outbound_rx, event_tx));

        Ok(Self { events, outbound })
    }
}

impl Transport for TcpTransport {
    fn send(&mut self, packet: &[u8]) -> Result<(), TransportError> {
        self.outbound
            .send(Bytes::copy_from_slice(packet))
            .map_err(|_| TransportError::NotConnected)
    }

    fn drain(&mut self) -> Vec<TransportEvent> {
        let mut drained = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            drained.push(event);
        }
        drained
    }
}

async fn read_loop(
    mut read_half: tokio::net::tcp::OwnedReadHalf,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    let mut buf = vec![0u8; READ_BUFFER];
    loop {
        match read_half.read(&mut buf).await {
            Ok(0) => {
                let _ = events.send(TransportEvent::Closed);
                return;
            }
            Ok(n) => {
                if events.send(TransportEvent::Data(Bytes::copy_from_slice(&buf[..n]))).is_err() {
                    // Transport dropped; nobody is listening anymore.
                    return;
                }
            }
            Err(error) => {
                let _ = events.send(TransportEvent::Error(error.to_string()));
                let _ = events.send(TransportEvent::Closed);
                return;
            }
        }
    }
}

async fn write_loop(
    mut write_half: tokio::net::tcp::OwnedWriteHalf,
    mut outbound: mpsc::UnboundedReceiver<Bytes>,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    while let Some(packet) = outbound.recv().await {
        if let Err(error) = write_half.write_all(&packet).await {
            let _ = events.send(TransportEvent::Error(format!("send failed: {error}")));
            return;
        }
    }
}
