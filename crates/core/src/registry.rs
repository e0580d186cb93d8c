//! Connection registry: maps remote peer ids to live connection handles.

use crate::transport::ConnectionHandle;
use std::collections::HashMap;
use tracing::debug;

/// Lookup table of live connections, at most one per peer id.
///
/// The registry holds handles for lookup only; connection lifetime is owned
/// by the transport tasks behind each handle.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    handles: HashMap<String, ConnectionHandle>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the handle for a peer, returning any displaced prior handle.
    ///
    /// Callers must drop the returned handle to tear down the superseded
    /// connection's writer.
    #[must_use = "dropping the displaced handle tears down the old connection"]
    pub fn register(&mut self, handle: ConnectionHandle) -> Option<ConnectionHandle> {
        let peer_id = handle.peer_id().to_string();
        let displaced = self.handles.insert(peer_id.clone(), handle);
        if displaced.is_some() {
            debug!(peer = %peer_id, "replacing existing connection handle");
        }
        displaced
    }

    /// Look up the handle for a peer.
    pub fn lookup(&self, peer_id: &str) -> Option<&ConnectionHandle> {
        self.handles.get(peer_id)
    }

    /// Remove and return the handle for a peer, if present.
    pub fn remove(&mut self, peer_id: &str) -> Option<ConnectionHandle> {
        self.handles.remove(peer_id)
    }

    /// Whether a live handle exists for a peer.
    pub fn contains(&self, peer_id: &str) -> bool {
        self.handles.contains_key(peer_id)
    }

    /// Number of live connections.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether the registry holds no connections.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ConnectionHandle;

    #[test]
    fn test_register_and_lookup() {
        let mut registry = ConnectionRegistry::new();
        let (handle, _rx) = ConnectionHandle::loopback("peer-a");

        assert!(registry.register(handle).is_none());
        assert!(registry.contains("peer-a"));
        assert_eq!(registry.lookup("peer-a").unwrap().peer_id(), "peer-a");
        assert!(registry.lookup("peer-b").is_none());
    }

    #[test]
    fn test_register_overwrite_returns_displaced() {
        let mut registry = ConnectionRegistry::new();
        let (first, mut first_rx) = ConnectionHandle::loopback("peer-a");
        let (second, _second_rx) = ConnectionHandle::loopback("peer-a");

        assert!(registry.register(first).is_none());
        let displaced = registry.register(second).expect("prior handle returned");
        assert_eq!(displaced.peer_id(), "peer-a");
        assert_eq!(registry.len(), 1);

        // Dropping the displaced handle closes its writer channel.
        drop(displaced);
        assert!(first_rx.try_recv().is_err());
    }

    #[test]
    fn test_remove() {
        let mut registry = ConnectionRegistry::new();
        let (handle, _rx) = ConnectionHandle::loopback("peer-a");
        let _ = registry.register(handle);

        assert!(registry.remove("peer-a").is_some());
        assert!(registry.remove("peer-a").is_none());
        assert!(registry.is_empty());
    }
}
