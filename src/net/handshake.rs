//! Name-exchange handshake that decides a connection's role.
//!
//! ```text
//! acceptor (this node)                 peer
//!   ── frame: own node name ──────────►
//!   ◄───────── frame: declared name ──
//!
//!   declared == CLOSE_CONNECTION_MARK  → Declined, close
//!   declared contains "api-"           → Api { name }
//!   anything else                      → Parent { name }
//! ```
//!
//! The declared name is trusted as-is. There is no authentication step.

use tokio::io::{AsyncRead, AsyncWrite};

use super::events::TreeEventKind;
use super::framing::{send_frame, FrameReader};
use crate::constants::{API_NAME_PREFIX, CLOSE_CONNECTION_MARK};
use crate::error::NetError;

/// Role a peer holds for the whole life of its connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerRole {
    /// Upstream link to this node's parent.
    Parent {
        /// Declared peer name.
        name: String,
    },
    /// Control-plane API client.
    Api {
        /// Declared peer name, also the registry key.
        name: String,
    },
}

impl PeerRole {
    /// Declared peer name.
    pub fn name(&self) -> &str {
        match self {
            PeerRole::Parent { name } | PeerRole::Api { name } => name,
        }
    }

    /// Whether this is an API client connection.
    pub fn is_api(&self) -> bool {
        matches!(self, PeerRole::Api { .. })
    }

    /// Event published once the role is registered.
    pub fn connect_event(&self) -> TreeEventKind {
        match self {
            PeerRole::Parent { .. } => TreeEventKind::ParentConnected,
            PeerRole::Api { .. } => TreeEventKind::ApiConnected,
        }
    }

    /// Event published when the connection is torn down.
    pub fn disconnect_event(&self) -> TreeEventKind {
        match self {
            PeerRole::Parent { .. } => TreeEventKind::ParentDisconnected,
            PeerRole::Api { .. } => TreeEventKind::ApiDisconnected,
        }
    }
}

/// Result of a completed name exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeOutcome {
    /// Peer identified itself; register it under this role.
    Accepted(PeerRole),
    /// Peer sent the close sentinel and should be dropped quietly.
    Declined,
}

/// Classify a declared peer name.
pub fn classify(declared: &str) -> HandshakeOutcome {
    if declared == CLOSE_CONNECTION_MARK {
        return HandshakeOutcome::Declined;
    }

    let name = declared.to_string();
    if declared.contains(API_NAME_PREFIX) {
        HandshakeOutcome::Accepted(PeerRole::Api { name })
    } else {
        HandshakeOutcome::Accepted(PeerRole::Parent { name })
    }
}

/// Run the acceptor side of the handshake.
///
/// Sends `local_name`, then waits (without timeout) for the peer's
/// declared name. `peer` is the remote address, used for error context.
pub async fn perform<R, W>(
    reader: &mut FrameReader<R>,
    writer: &mut W,
    local_name: &str,
    peer: &str,
) -> Result<HandshakeOutcome, NetError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    send_frame(writer, local_name.as_bytes())
        .await
        .map_err(|source| NetError::HandshakeSendFailure {
            peer: peer.to_string(),
            source,
        })?;

    let declared = reader
        .read_frame()
        .await
        .map_err(|source| NetError::HandshakeReadFailure {
            peer: peer.to_string(),
            source,
        })?;

    let outcome = classify(&String::from_utf8_lossy(&declared));
    if outcome == HandshakeOutcome::Declined {
        log::info!("[Handshake] Connection closed by peer {peer}: handshake declined");
    }
    Ok(outcome)
}
