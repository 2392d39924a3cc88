//! Process-wide registry of the parent and API connections.
//!
//! Every dispatch task mutates the registry when it classifies its peer and
//! again on teardown, while other subsystems read it to send frames. All of
//! that goes through one mutex; each public method is a single critical
//! section, and no lock is held across an `.await`.
//!
//! # Stale connections
//!
//! A second parent handshake replaces the first, and a reused API name
//! replaces the earlier connection. The replaced connection keeps running
//! until its own read fails. Removal is therefore keyed on the connection
//! id: a stale connection's teardown never evicts its replacement.
//!
//! ```text
//! parent:  Some(#12 "child-7")
//! api:     { "api-dashboard": #9, "api-cli": #14 }
//! ```

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::peer::{ConnectionId, PeerHandle};

#[derive(Debug, Default)]
struct RegistryState {
    parent: Option<PeerHandle>,
    api: HashMap<String, PeerHandle>,
}

/// Registry of live connections, keyed by role.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    state: Mutex<RegistryState>,
}

impl ConnectionRegistry {
    /// Create an empty registry (no parent, no API clients).
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        // State stays consistent even if a holder panicked: every critical
        // section is a single map or option operation.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Mutation (dispatch tasks) ───────────────────────────────────────────

    /// Install `handle` as the parent, returning the replaced parent.
    pub(crate) fn set_parent(&self, handle: PeerHandle) -> Option<PeerHandle> {
        self.lock().parent.replace(handle)
    }

    /// Clear the parent slot if it still holds connection `id`.
    pub(crate) fn clear_parent_if(&self, id: ConnectionId) -> bool {
        let mut state = self.lock();
        if state.parent.as_ref().is_some_and(|p| p.id() == id) {
            state.parent = None;
            true
        } else {
            false
        }
    }

    /// Register an API connection under its declared name.
    ///
    /// Returns the connection previously registered under that name.
    pub(crate) fn insert_api(&self, handle: PeerHandle) -> Option<PeerHandle> {
        let name = handle.name().to_string();
        self.lock().api.insert(name, handle)
    }

    /// Remove the API entry `name` if it still belongs to connection `id`.
    pub(crate) fn remove_api_if(&self, name: &str, id: ConnectionId) -> bool {
        let mut state = self.lock();
        if state.api.get(name).is_some_and(|h| h.id() == id) {
            state.api.remove(name);
            true
        } else {
            false
        }
    }

    // ── Lookup ──────────────────────────────────────────────────────────────

    /// Current parent connection, if any.
    pub fn parent(&self) -> Option<PeerHandle> {
        self.lock().parent.clone()
    }

    /// Declared name of the current parent.
    pub fn parent_name(&self) -> Option<String> {
        self.lock().parent.as_ref().map(|p| p.name().to_string())
    }

    /// Whether a parent is connected. `false` means this node is a root.
    pub fn has_parent(&self) -> bool {
        self.lock().parent.is_some()
    }

    /// API connection registered under `name`.
    pub fn api_connection(&self, name: &str) -> Option<PeerHandle> {
        self.lock().api.get(name).cloned()
    }

    /// Whether an API connection is registered under `name`.
    pub fn contains_api(&self, name: &str) -> bool {
        self.lock().api.contains_key(name)
    }

    /// Names of all registered API connections, sorted.
    pub fn api_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().api.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered API connections.
    pub fn api_count(&self) -> usize {
        self.lock().api.len()
    }

    // ── Outbound sends ──────────────────────────────────────────────────────

    /// Send one frame to the parent.
    ///
    /// Returns `false` when there is no parent or its connection is closing.
    pub fn send_to_parent(&self, payload: &[u8]) -> bool {
        self.lock().parent.as_ref().is_some_and(|p| p.send(payload))
    }

    /// Send one frame to the API client `name`.
    pub fn send_to_api(&self, name: &str, payload: &[u8]) -> bool {
        self.lock().api.get(name).is_some_and(|h| h.send(payload))
    }

    /// Send one frame to every API client. Returns how many accepted it.
    pub fn broadcast_to_api(&self, payload: &[u8]) -> usize {
        self.lock()
            .api
            .values()
            .filter(|h| h.send(payload))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use tokio::sync::mpsc;

    fn handle(id: ConnectionId, name: &str) -> (PeerHandle, mpsc::UnboundedReceiver<Vec<u8>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let addr: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        (PeerHandle::new(id, name, addr, tx), rx)
    }

    #[test]
    fn test_empty_registry_is_root() {
        let registry = ConnectionRegistry::new();
        assert!(!registry.has_parent());
        assert!(registry.parent_name().is_none());
        assert_eq!(registry.api_count(), 0);
        assert!(!registry.send_to_parent(b"x"));
    }

    #[test]
    fn test_parent_replacement_is_last_writer_wins() {
        let registry = ConnectionRegistry::new();
        let (first, _rx1) = handle(1, "child-7");
        let (second, _rx2) = handle(2, "child-8");

        assert!(registry.set_parent(first).is_none());
        let replaced = registry.set_parent(second).unwrap();
        assert_eq!(replaced.id(), 1);
        assert_eq!(registry.parent_name().as_deref(), Some("child-8"));
    }

    #[test]
    fn test_stale_parent_teardown_keeps_replacement() {
        let registry = ConnectionRegistry::new();
        let (first, _rx1) = handle(1, "child-7");
        let (second, _rx2) = handle(2, "child-8");
        registry.set_parent(first);
        registry.set_parent(second);

        assert!(!registry.clear_parent_if(1));
        assert_eq!(registry.parent().map(|p| p.id()), Some(2));

        assert!(registry.clear_parent_if(2));
        assert!(!registry.has_parent());
    }

    #[test]
    fn test_api_insert_and_identity_checked_remove() {
        let registry = ConnectionRegistry::new();
        let (old, _rx1) = handle(3, "api-dashboard");
        let (new, _rx2) = handle(4, "api-dashboard");

        registry.insert_api(old);
        assert!(registry.insert_api(new).is_some());
        assert!(!registry.remove_api_if("api-dashboard", 3));
        assert!(registry.contains_api("api-dashboard"));
        assert!(registry.remove_api_if("api-dashboard", 4));
        assert!(!registry.contains_api("api-dashboard"));
    }

    #[test]
    fn test_sends_reach_writer_queues() {
        let registry = ConnectionRegistry::new();
        let (parent, mut parent_rx) = handle(1, "child-7");
        let (api_a, mut a_rx) = handle(2, "api-a");
        let (api_b, mut b_rx) = handle(3, "api-b");
        registry.set_parent(parent);
        registry.insert_api(api_a);
        registry.insert_api(api_b);

        assert!(registry.send_to_parent(b"up"));
        assert!(registry.send_to_api("api-a", b"only-a"));
        assert!(!registry.send_to_api("api-missing", b"nope"));
        assert_eq!(registry.broadcast_to_api(b"all"), 2);

        assert!(parent_rx.try_recv().is_ok());
        assert_eq!(a_rx.try_recv().unwrap().len(), 4 + "only-a".len());
        assert!(a_rx.try_recv().is_ok());
        assert!(b_rx.try_recv().is_ok());
        assert_eq!(registry.api_names(), vec!["api-a".to_string(), "api-b".to_string()]);
    }
}
