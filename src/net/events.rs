//! Lifecycle events published by the tree listener.
//!
//! Dispatch tasks announce role changes through an [`EventBus`]. Publishing
//! is fire-and-forget: the default [`ChannelEventBus`] pushes onto an
//! unbounded `mpsc` channel, so a slow subscriber never stalls a connection
//! task.

use std::fmt;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Kind of lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TreeEventKind {
    /// An API client completed its handshake.
    ApiConnected,
    /// An API client's connection ended.
    ApiDisconnected,
    /// A peer claimed the parent slot.
    ParentConnected,
    /// A parent connection ended.
    ParentDisconnected,
}

impl TreeEventKind {
    /// Canonical event name seen by subscribers.
    pub fn name(self) -> &'static str {
        match self {
            TreeEventKind::ApiConnected => "ON_API_CONNECTED",
            TreeEventKind::ApiDisconnected => "ON_API_DISCONNECTED",
            TreeEventKind::ParentConnected => "ON_PARENT_CONNECTED",
            TreeEventKind::ParentDisconnected => "ON_PARENT_DISCONNECTED",
        }
    }
}

impl fmt::Display for TreeEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One published event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleEvent {
    /// What happened.
    pub kind: TreeEventKind,
    /// Declared peer name, as raw bytes.
    pub payload: Vec<u8>,
    /// Optional opaque attachment. The listener never sets it.
    pub extra: Option<Vec<u8>>,
}

impl LifecycleEvent {
    /// Payload decoded as a peer name.
    pub fn peer_name(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

/// Sink for lifecycle events.
///
/// Implementations must not block the caller on subscriber processing.
pub trait EventBus: Send + Sync {
    /// Publish `kind` with `payload` and an optional `extra` attachment.
    fn publish(&self, kind: TreeEventKind, payload: Vec<u8>, extra: Option<Vec<u8>>);
}

/// Event bus backed by an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelEventBus {
    tx: UnboundedSender<LifecycleEvent>,
}

impl ChannelEventBus {
    /// Create a bus together with the receiver subscribers drain.
    pub fn new() -> (Self, UnboundedReceiver<LifecycleEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventBus for ChannelEventBus {
    fn publish(&self, kind: TreeEventKind, payload: Vec<u8>, extra: Option<Vec<u8>>) {
        if self
            .tx
            .send(LifecycleEvent { kind, payload, extra })
            .is_err()
        {
            log::debug!("[Events] No subscriber left, dropped {kind}");
        }
    }
}

/// Event bus that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventBus;

impl EventBus for NoopEventBus {
    fn publish(&self, _kind: TreeEventKind, _payload: Vec<u8>, _extra: Option<Vec<u8>>) {}
}
