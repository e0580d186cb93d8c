//! Transport layer for peer-to-peer messaging.
//!
//! This module provides:
//! - Identity management (keypair persistence)
//! - Endpoint wrapper for dialing and accepting peer connections
//! - Per-connection reader/writer tasks bridged to the application loop
//!   through a single [`TransportEvent`] channel
//!
//! The payload of every frame is the raw UTF-8 Markdown source of exactly
//! one message; there is no envelope or versioning.

pub mod endpoint;
pub mod identity;

pub use endpoint::{ChatEndpoint, PeerConnection, ALPN_CHAT};
pub use identity::Identity;

use crate::error::{Error, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, warn};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Which side initiated a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// We dialed the remote peer.
    Outbound,
    /// The remote peer dialed us.
    Inbound,
}

/// Events delivered from transport tasks to the application loop.
///
/// All registry/store mutation happens on the receiving side; transport
/// tasks never touch shared state directly.
#[derive(Debug)]
pub enum TransportEvent {
    /// A connection is established and ready to send.
    Connected {
        peer_id: String,
        handle: ConnectionHandle,
        direction: Direction,
    },
    /// One inbound message.
    Data { peer_id: String, text: String },
    /// One specific connection ended, cleanly or not. A newer connection to
    /// the same peer may already have replaced it; consumers match on
    /// `connection_id` before unregistering anything.
    Closed {
        peer_id: String,
        connection_id: u64,
        reason: String,
    },
}

/// Sender half of a connection's writer task.
///
/// Cheap to clone; dropping every clone closes the writer and finishes the
/// underlying send stream.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    peer_id: String,
    connection_id: u64,
    tx: mpsc::UnboundedSender<String>,
}

impl ConnectionHandle {
    fn new(peer_id: String, tx: mpsc::UnboundedSender<String>) -> Self {
        Self {
            peer_id,
            connection_id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            tx,
        }
    }

    /// The remote peer this handle sends to.
    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    /// Distinguishes this connection from earlier or later connections to
    /// the same peer.
    pub fn connection_id(&self) -> u64 {
        self.connection_id
    }

    /// Queue one message for transmission.
    ///
    /// Fails with [`Error::NotConnected`] once the writer task has exited.
    pub fn send(&self, text: &str) -> Result<()> {
        self.tx
            .send(text.to_string())
            .map_err(|_| Error::NotConnected(self.peer_id.clone()))
    }

    /// A handle wired to a local channel instead of a network connection.
    ///
    /// Frames sent through the handle appear on the returned receiver. Used
    /// by tests that exercise routing without a real endpoint.
    pub fn loopback(peer_id: &str) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(peer_id.to_string(), tx), rx)
    }
}

/// Spawn the reader and writer tasks for an established connection.
///
/// Returns the [`ConnectionHandle`] for outbound sends. Inbound frames and
/// the eventual close are reported on `events`.
pub fn spawn_connection(
    conn: PeerConnection,
    events: mpsc::UnboundedSender<TransportEvent>,
    max_frame_bytes: usize,
) -> ConnectionHandle {
    let PeerConnection {
        peer_id,
        mut send,
        mut recv,
    } = conn;

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let handle = ConnectionHandle::new(peer_id.clone(), tx);
    let connection_id = handle.connection_id();

    // Writer: drains the handle's queue until every handle clone is dropped
    // or the stream fails.
    let writer_peer = peer_id.clone();
    tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if let Err(e) = endpoint::write_frame(&mut send, &text).await {
                warn!(peer = %writer_peer, "send failed: {}", e);
                break;
            }
        }
        // Finishing the stream lets the peer observe a clean close.
        let _ = send.finish();
        debug!(peer = %writer_peer, "writer task ended");
    });

    // Reader: forwards frames until EOF or error, then reports the close.
    let reader_events = events;
    tokio::spawn(async move {
        loop {
            match endpoint::read_frame(&mut recv, max_frame_bytes).await {
                Ok(text) => {
                    // Empty frames are connection-open padding, not messages.
                    if text.is_empty() {
                        debug!(peer = %peer_id, "ignoring empty frame");
                        continue;
                    }
                    if reader_events
                        .send(TransportEvent::Data {
                            peer_id: peer_id.clone(),
                            text,
                        })
                        .is_err()
                    {
                        break;
                    }
                }
                Err(e) => {
                    debug!(peer = %peer_id, "connection closed: {}", e);
                    let _ = reader_events.send(TransportEvent::Closed {
                        peer_id: peer_id.clone(),
                        connection_id,
                        reason: e.to_string(),
                    });
                    break;
                }
            }
        }
    });

    handle
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_loopback_handle_delivers_frames() {
        let (handle, mut rx) = ConnectionHandle::loopback("peer-a");
        handle.send("hello").unwrap();
        assert_eq!(rx.recv().await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_send_after_writer_gone() {
        let (handle, rx) = ConnectionHandle::loopback("peer-a");
        drop(rx);
        assert!(matches!(handle.send("hello"), Err(Error::NotConnected(_))));
    }

    #[test]
    fn test_handles_to_same_peer_have_distinct_ids() {
        let (first, _rx_a) = ConnectionHandle::loopback("peer-a");
        let (second, _rx_b) = ConnectionHandle::loopback("peer-a");
        assert_ne!(first.connection_id(), second.connection_id());
    }
}
