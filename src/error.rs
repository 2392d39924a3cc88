//! Error taxonomy for the tree listener.
//!
//! Every failure is local to the task that observed it: the listener owns
//! [`NetError::ListenFailure`] and [`NetError::AcceptFailure`], a dispatch
//! task owns the handshake and read failures of its own connection. None of
//! them cross task boundaries; they surface through logs and disconnect
//! events only.
//!
//! A peer sending the close sentinel is not an error and has no variant
//! here, see [`crate::net::handshake::HandshakeOutcome::Declined`].

use std::io;

use crate::net::framing::FrameError;

/// Failure reported by the listener or by a single connection task.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    /// Bind address could not be resolved or bound.
    #[error("cannot listen on {addr}: {source}")]
    ListenFailure {
        /// The `host:port` target that failed.
        addr: String,
        /// Underlying resolution or bind error.
        #[source]
        source: io::Error,
    },

    /// The accept loop hit an error and stopped.
    #[error("accept failed: {0}")]
    AcceptFailure(#[source] io::Error),

    /// Sending our own name to the peer failed.
    #[error("handshake send to {peer} failed: {source}")]
    HandshakeSendFailure {
        /// Remote address of the peer.
        peer: String,
        /// Transport error.
        #[source]
        source: FrameError,
    },

    /// Reading the peer's declared name failed.
    #[error("handshake read from {peer} failed: {source}")]
    HandshakeReadFailure {
        /// Remote address of the peer.
        peer: String,
        /// Transport error.
        #[source]
        source: FrameError,
    },

    /// An established connection failed to deliver its next frame.
    #[error("reading data from {name} failed: {source}")]
    DispatchReadFailure {
        /// Declared name of the peer.
        name: String,
        /// Transport error.
        #[source]
        source: FrameError,
    },
}

impl NetError {
    /// Stable taxonomy tag, used as a log prefix.
    pub fn kind(&self) -> &'static str {
        match self {
            NetError::ListenFailure { .. } => "ListenFailure",
            NetError::AcceptFailure(_) => "AcceptFailure",
            NetError::HandshakeSendFailure { .. } => "HandshakeSendFailure",
            NetError::HandshakeReadFailure { .. } => "HandshakeReadFailure",
            NetError::DispatchReadFailure { .. } => "DispatchReadFailure",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tags() {
        let err = NetError::AcceptFailure(io::Error::other("boom"));
        assert_eq!(err.kind(), "AcceptFailure");

        let err = NetError::DispatchReadFailure {
            name: "api-x".to_string(),
            source: FrameError::Closed,
        };
        assert_eq!(err.kind(), "DispatchReadFailure");
    }

    #[test]
    fn test_listen_failure_message_names_address() {
        let err = NetError::ListenFailure {
            addr: "10.0.0.1:8888".to_string(),
            source: io::Error::new(io::ErrorKind::AddrInUse, "in use"),
        };
        let msg = err.to_string();
        assert!(msg.contains("10.0.0.1:8888"), "message should name address: {msg}");
    }
}
