//! Parent-side connection handling for a tree node.
//!
//! A node has at most one parent and any number of API clients, all
//! arriving on the same TCP listener. Each connection identifies itself in
//! a short handshake and is then served by its own task.
//!
//! # Architecture
//!
//! ```text
//!                 ParentListener (accept loop)
//!                         │ one task per connection
//!                         ▼
//!  peer ◄──frames──► handle_connection ──► MessageHandler
//!                    │   handshake   │
//!                    ▼               ▼
//!        ConnectionRegistry      EventBus
//!        (parent, api map)       (ON_*_CONNECTED / DISCONNECTED)
//!                    ▲
//!                    └── other subsystems: send_to_parent / send_to_api
//! ```
//!
//! # Wire Protocol
//!
//! Length-prefixed frames: `[u32 LE length][payload]`.
//!
//! See [`framing`] for the codec and [`handshake`] for role selection.

pub mod dispatch;
pub mod events;
pub mod framing;
pub mod handler;
pub mod handshake;
pub mod listener;
pub mod peer;
pub mod registry;

pub use dispatch::{handle_connection, NodeContext};
pub use events::{ChannelEventBus, EventBus, LifecycleEvent, NoopEventBus, TreeEventKind};
pub use handler::{ChannelHandler, InboundMessage, LoggingHandler, MessageHandler};
pub use handshake::{HandshakeOutcome, PeerRole};
pub use listener::{listen, ListenerHandle, ParentListener};
pub use peer::{ConnectionId, PeerHandle};
pub use registry::ConnectionRegistry;
