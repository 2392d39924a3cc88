//! Message handler seam for established connections.
//!
//! The dispatch loop does not interpret frames. It hands each payload to a
//! [`MessageHandler`] together with where the frame came from, and waits for
//! the call to return before reading the next frame.

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Receives every frame read from an established connection.
///
/// Called synchronously from the connection's task, once per frame, in
/// receipt order. Keep it fast; expensive work should be queued.
pub trait MessageHandler: Send + Sync {
    /// Handle one inbound frame.
    ///
    /// * `is_api` - the frame came from an API client connection
    /// * `from_parent` - the frame arrived on a connection from the parent
    ///   direction of the tree
    /// * `payload` - the raw frame payload
    fn handle(&self, is_api: bool, from_parent: bool, payload: Vec<u8>);
}

/// Handler that only logs frame metadata.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingHandler;

impl MessageHandler for LoggingHandler {
    fn handle(&self, is_api: bool, from_parent: bool, payload: Vec<u8>) {
        log::debug!(
            "[Handler] {} bytes (api={}, from_parent={})",
            payload.len(),
            is_api,
            from_parent
        );
    }
}

/// Frame forwarded by [`ChannelHandler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// The frame came from an API client connection.
    pub is_api: bool,
    /// The frame arrived from the parent direction.
    pub from_parent: bool,
    /// Raw frame payload.
    pub payload: Vec<u8>,
}

/// Handler that forwards frames onto an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelHandler {
    tx: UnboundedSender<InboundMessage>,
}

impl ChannelHandler {
    /// Create a handler and the receiver its frames arrive on.
    pub fn new() -> (Self, UnboundedReceiver<InboundMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl MessageHandler for ChannelHandler {
    fn handle(&self, is_api: bool, from_parent: bool, payload: Vec<u8>) {
        let msg = InboundMessage {
            is_api,
            from_parent,
            payload,
        };
        if self.tx.send(msg).is_err() {
            log::warn!("[Handler] Message channel closed, frame dropped");
        }
    }
}
