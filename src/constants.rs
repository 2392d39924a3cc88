//! Protocol-wide constants for tree-net.
//!
//! Centralizes the magic values the tree protocol relies on so the
//! listener, handshake and codec agree on them.
//!
//! # Categories
//!
//! - **Network**: Default bind address and port
//! - **Handshake**: Reserved peer names and role prefixes
//! - **Framing**: Wire limits

// ============================================================================
// Network
// ============================================================================

/// Port the tree listener binds when the configured port is unset or zero.
pub const DEFAULT_TREE_PORT: u16 = 8888;

/// Bind host used when configuration does not name one.
pub const DEFAULT_TREE_IP: &str = "0.0.0.0";

/// Node name used when neither configuration nor the host name provide one.
pub const FALLBACK_NODE_NAME: &str = "tree-node";

// ============================================================================
// Handshake
// ============================================================================

/// Name marker that flags a connecting peer as an API client.
///
/// Any declared name containing this marker (not only at the start) is
/// registered as an API connection; every other name claims the parent slot.
pub const API_NAME_PREFIX: &str = "api-";

/// Reserved name a peer sends instead of its own to decline the handshake.
pub const CLOSE_CONNECTION_MARK: &str = "***CLOSE_CONNECTION***";

// ============================================================================
// Framing
// ============================================================================

/// Maximum frame payload size (16 MB).
pub const MAX_FRAME_SIZE: u32 = 16 * 1024 * 1024;

/// Size of the little-endian length header preceding every frame.
pub const FRAME_HEADER_LEN: usize = 4;

/// Read buffer size for connection read halves (64 KB).
pub const READ_BUFFER_SIZE: usize = 64 * 1024;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_mark_is_not_an_api_name() {
        // The sentinel must never be mistaken for an API client name
        assert!(!CLOSE_CONNECTION_MARK.contains(API_NAME_PREFIX));
    }

    #[test]
    fn test_default_port_is_nonzero() {
        // Zero means "unset" in configuration, so the default cannot be zero
        assert_ne!(DEFAULT_TREE_PORT, 0);
    }

    #[test]
    fn test_read_buffer_smaller_than_max_frame() {
        assert!((READ_BUFFER_SIZE as u64) < u64::from(MAX_FRAME_SIZE));
    }
}
