//! tree-net - parent-side connection manager for a tree overlay node.
//!
//! Each node in the tree accepts one upstream parent link and any number of
//! control-plane API clients on a single TCP listener. This crate accepts
//! those connections, classifies them with a name handshake, tracks them in
//! a shared registry and feeds their frames to a message handler.
//!
//! # Modules
//!
//! - [`net`] - Listener, handshake, dispatch loop, registry and events
//! - [`config`] - Node configuration loading/saving
//! - [`constants`] - Protocol constants (default port, reserved names)
//! - [`error`] - Error taxonomy

pub mod config;
pub mod constants;
pub mod error;
pub mod net;

// Re-export commonly used types
pub use config::NodeConfig;
pub use error::NetError;
pub use net::{
    ConnectionRegistry, EventBus, ListenerHandle, MessageHandler, NodeContext, ParentListener,
    PeerHandle, PeerRole, TreeEventKind,
};
