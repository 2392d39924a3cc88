//! Shared handle to an established peer connection.
//!
//! The dispatch task owns the read half of a connection. Outbound traffic
//! goes through a [`PeerHandle`], which queues encoded frames for a
//! companion writer task that owns the write half. Handles are cheap to
//! clone and are what the registry hands out to other subsystems.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use super::framing::encode_frame;

/// Process-unique identifier of one accepted connection.
pub type ConnectionId = u64;

/// Allocate the next connection id (monotonic).
pub(crate) fn next_connection_id() -> ConnectionId {
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Send side of an established connection.
#[derive(Clone)]
pub struct PeerHandle {
    id: ConnectionId,
    name: Arc<str>,
    remote_addr: SocketAddr,
    frame_tx: UnboundedSender<Vec<u8>>,
}

impl std::fmt::Debug for PeerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerHandle")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("remote_addr", &self.remote_addr)
            .finish_non_exhaustive()
    }
}

impl PeerHandle {
    pub(crate) fn new(
        id: ConnectionId,
        name: &str,
        remote_addr: SocketAddr,
        frame_tx: UnboundedSender<Vec<u8>>,
    ) -> Self {
        Self {
            id,
            name: Arc::from(name),
            remote_addr,
            frame_tx,
        }
    }

    /// Connection identifier.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Name the peer declared during the handshake.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Remote socket address.
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Queue one frame for this peer.
    ///
    /// Returns `false` if the payload is too large to frame or the writer
    /// task is gone (connection closed).
    pub fn send(&self, payload: &[u8]) -> bool {
        match encode_frame(payload) {
            Ok(encoded) => self.frame_tx.send(encoded).is_ok(),
            Err(e) => {
                log::warn!("[Peer] Not sending to {}: {e}", self.name);
                false
            }
        }
    }

    /// Whether the writer task has stopped accepting frames.
    pub fn is_closed(&self) -> bool {
        self.frame_tx.is_closed()
    }
}

/// Spawn the writer task for a connection.
///
/// Returns the queue sender and the task handle. Aborting the task drops
/// the write half, which closes our side of the stream.
pub(crate) fn spawn_writer(
    name: String,
    writer: OwnedWriteHalf,
) -> (UnboundedSender<Vec<u8>>, JoinHandle<()>) {
    let (frame_tx, frame_rx) = mpsc::unbounded_channel::<Vec<u8>>();
    let handle = tokio::spawn(write_loop(name, writer, frame_rx));
    (frame_tx, handle)
}

/// Write loop: receives encoded frames and writes them to the socket.
async fn write_loop(
    name: String,
    mut writer: OwnedWriteHalf,
    mut frame_rx: UnboundedReceiver<Vec<u8>>,
) {
    while let Some(data) = frame_rx.recv().await {
        if let Err(e) = writer.write_all(&data).await {
            log::error!("[Peer] Write error for {}: {e}", name);
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_ids_are_unique() {
        let a = next_connection_id();
        let b = next_connection_id();
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn test_send_queues_encoded_frame() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let addr: SocketAddr = "127.0.0.1:9".parse().unwrap();
        let handle = PeerHandle::new(7, "api-dashboard", addr, tx);

        assert!(handle.send(b"hi"));
        let queued = rx.try_recv().unwrap();
        assert_eq!(queued, encode_frame(b"hi").unwrap());
        assert_eq!(handle.name(), "api-dashboard");
        assert_eq!(handle.id(), 7);
    }

    #[test]
    fn test_send_fails_after_writer_gone() {
        let (tx, rx) = mpsc::unbounded_channel();
        let addr: SocketAddr = "127.0.0.1:9".parse().unwrap();
        let handle = PeerHandle::new(1, "child-7", addr, tx);
        drop(rx);

        assert!(handle.is_closed());
        assert!(!handle.send(b"lost"));
    }
}
