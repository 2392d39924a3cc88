//! Per-connection task: handshake, registration, read loop, teardown.
//!
//! # Lifecycle
//!
//! ```text
//! accept ──► handshake ──declined/failed──► close (no registry entry, no event)
//!               │
//!            accepted
//!               ▼
//!         registry insert ──► ON_*_CONNECTED
//!               ▼
//!         read frame ──► handler (in order, one at a time) ──┐
//!               ▲                                           │
//!               └───────────────────────────────────────────┘
//!               │ read fails
//!               ▼
//!         close stream ──► registry remove ──► ON_*_DISCONNECTED
//! ```
//!
//! Teardown lives in a guard armed right after registration, so it runs
//! exactly once whether the loop ends on a read error or the handler panics.

// Rust guideline compliant 2026-02

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpStream;

use super::events::EventBus;
use super::framing::{FrameError, FrameReader};
use super::handler::MessageHandler;
use super::handshake::{self, HandshakeOutcome, PeerRole};
use super::peer::{self, next_connection_id, ConnectionId, PeerHandle};
use super::registry::ConnectionRegistry;
use crate::error::NetError;

/// Inbound connections handled here always come from the parent direction.
const FROM_PARENT_DIRECTION: bool = true;

/// Everything a connection task needs besides its own stream.
///
/// Shared by the listener and every dispatch task it spawns.
pub struct NodeContext {
    local_name: String,
    registry: Arc<ConnectionRegistry>,
    events: Arc<dyn EventBus>,
    handler: Arc<dyn MessageHandler>,
}

impl std::fmt::Debug for NodeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeContext")
            .field("local_name", &self.local_name)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl NodeContext {
    /// Create a context with a fresh, empty registry.
    pub fn new(
        local_name: impl Into<String>,
        events: Arc<dyn EventBus>,
        handler: Arc<dyn MessageHandler>,
    ) -> Self {
        Self {
            local_name: local_name.into(),
            registry: Arc::new(ConnectionRegistry::new()),
            events,
            handler,
        }
    }

    /// Use an existing registry instead of a fresh one.
    pub fn with_registry(mut self, registry: Arc<ConnectionRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// This node's own name, sent first in every handshake.
    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    /// The shared connection registry.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }
}

/// Drive one accepted connection to completion.
///
/// Never returns an error: every failure is logged and ends only this
/// connection.
pub async fn handle_connection(stream: TcpStream, remote_addr: SocketAddr, ctx: Arc<NodeContext>) {
    let id = next_connection_id();
    let peer = remote_addr.to_string();
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = FrameReader::new(read_half);

    // Returning before registration drops both halves, which closes the stream
    let role = match handshake::perform(&mut reader, &mut write_half, &ctx.local_name, &peer).await {
        Ok(HandshakeOutcome::Accepted(role)) => role,
        Ok(HandshakeOutcome::Declined) => return,
        Err(e) => {
            log::error!("[Handshake] {}: {e}", e.kind());
            return;
        }
    };

    let (frame_tx, writer_task) = peer::spawn_writer(role.name().to_string(), write_half);
    register(&ctx, &role, PeerHandle::new(id, role.name(), remote_addr, frame_tx));

    let is_api = role.is_api();
    let name = role.name().to_string();
    let teardown_ctx = Arc::clone(&ctx);
    let mut reader = scopeguard::guard(reader, move |reader| {
        drop(reader);
        writer_task.abort();
        teardown(&teardown_ctx, &role, id);
    });

    loop {
        match reader.read_frame().await {
            Ok(frame) => ctx.handler.handle(is_api, FROM_PARENT_DIRECTION, frame),
            Err(FrameError::Closed) => {
                log::info!("[Dispatch] {} closed the connection", name);
                break;
            }
            Err(source) => {
                let err = NetError::DispatchReadFailure { name, source };
                log::error!("[Dispatch] {}: {err}", err.kind());
                break;
            }
        }
    }
}

/// Insert the connection under its role, then announce it.
fn register(ctx: &NodeContext, role: &PeerRole, handle: PeerHandle) {
    let replaced = match role {
        PeerRole::Parent { .. } => ctx.registry.set_parent(handle),
        PeerRole::Api { .. } => ctx.registry.insert_api(handle),
    };

    if let Some(old) = replaced {
        log::warn!(
            "[Registry] {} replaces connection #{} ({})",
            role.name(),
            old.id(),
            old.remote_addr()
        );
    }
    log::info!(
        "[Registry] {} connected as {}",
        role.name(),
        if role.is_api() { "API client" } else { "parent" }
    );

    ctx.events
        .publish(role.connect_event(), role.name().as_bytes().to_vec(), None);
}

/// Remove the connection from the registry, then announce the disconnect.
fn teardown(ctx: &NodeContext, role: &PeerRole, id: ConnectionId) {
    let removed = match role {
        PeerRole::Parent { .. } => ctx.registry.clear_parent_if(id),
        PeerRole::Api { name } => ctx.registry.remove_api_if(name, id),
    };
    if !removed {
        log::debug!("[Registry] {} (#{id}) was already replaced", role.name());
    }
    log::info!("[Registry] {} disconnected", role.name());

    ctx.events
        .publish(role.disconnect_event(), role.name().as_bytes().to_vec(), None);
}
