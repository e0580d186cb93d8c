//! Message router: bridges transport events and user intent to the
//! conversation store and connection registry.
//!
//! The router is the single mutation funnel for chat state. The UI loop
//! feeds it transport events and user actions; it returns [`ChatEvent`]s
//! describing what changed. It is not thread-safe by itself; confine it to
//! one task.

use crate::chat::store::ConversationStore;
use crate::chat::types::{title_for_peer, Conversation, ConversationId, Message};
use crate::error::{Error, Result};
use crate::registry::ConnectionRegistry;
use crate::transport::{ConnectionHandle, Direction, TransportEvent};
use tracing::{debug, info, warn};

/// Events emitted by router operations for UI notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// A conversation was created for a newly-connected peer.
    ConversationCreated {
        id: ConversationId,
        peer_id: String,
    },
    /// The active conversation changed (None = connect-form view).
    ActiveChanged { id: Option<ConversationId> },
    /// A message was transmitted and appended to local history.
    MessageSent { id: ConversationId },
    /// An inbound message was appended to its conversation.
    MessageReceived { id: ConversationId },
    /// A conversation title changed.
    ConversationRenamed { id: ConversationId },
    /// A conversation was deleted.
    ConversationDeleted { id: ConversationId },
    /// The connection to a peer ended; its conversation remains.
    PeerDisconnected { peer_id: String, reason: String },
}

/// Router owning the conversation store and connection registry.
pub struct MessageRouter {
    store: ConversationStore,
    registry: ConnectionRegistry,
    local_id: String,
    max_message_bytes: usize,
}

impl MessageRouter {
    /// Create a router for the given local peer id.
    pub fn new(local_id: String, max_message_bytes: usize) -> Self {
        Self {
            store: ConversationStore::new(),
            registry: ConnectionRegistry::new(),
            local_id,
            max_message_bytes,
        }
    }

    /// Our peer id, as assigned by the transport.
    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    /// Read access to the conversation store for rendering.
    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    /// Whether a live connection exists for a peer.
    pub fn is_connected(&self, peer_id: &str) -> bool {
        self.registry.contains(peer_id)
    }

    // ==================== Connection lifecycle ====================

    /// Validate a connect target before dialing.
    ///
    /// Rejects empty targets and self-connection; the UI surfaces either as
    /// a transient error.
    pub fn validate_connect_target(&self, target: &str) -> Result<()> {
        let target = target.trim();
        if target.is_empty() {
            return Err(Error::EmptyTarget);
        }
        if target == self.local_id {
            return Err(Error::SelfConnection);
        }
        Ok(())
    }

    /// Register an established connection (either direction).
    ///
    /// Reuses the peer's existing conversation on reconnect, otherwise
    /// creates one titled from the truncated peer id. The conversation is
    /// activated in both cases. Any handle displaced from the registry is
    /// dropped here, which tears down the superseded connection's writer.
    pub fn connection_established(
        &mut self,
        handle: ConnectionHandle,
        direction: Direction,
    ) -> Vec<ChatEvent> {
        let peer_id = handle.peer_id().to_string();
        let mut events = Vec::new();

        if let Some(displaced) = self.registry.register(handle) {
            warn!(peer = %peer_id, "dropping superseded connection handle");
            drop(displaced);
        }

        let id = match self.store.find_by_peer(&peer_id) {
            Some(existing) => {
                debug!(peer = %peer_id, "reusing conversation on reconnect");
                existing.id.clone()
            }
            None => {
                // find_by_peer returned None, so create cannot collide.
                let conversation = self
                    .store
                    .create(&peer_id, title_for_peer(&peer_id))
                    .expect("no conversation exists for this peer");
                let id = conversation.id.clone();
                events.push(ChatEvent::ConversationCreated {
                    id: id.clone(),
                    peer_id: peer_id.clone(),
                });
                id
            }
        };

        info!(peer = %peer_id, ?direction, "connection established");

        // The id came from the store, so activation cannot fail.
        self.store
            .set_active(&id)
            .expect("conversation exists in store");
        events.push(ChatEvent::ActiveChanged { id: Some(id) });

        events
    }

    /// Handle one connection ending, cleanly or not.
    ///
    /// Only the close of the currently registered connection unregisters
    /// anything; a close reported by a connection that a redial already
    /// displaced must not tear down the live handle, so the ids are matched
    /// first. The conversation survives either way, and sends fail with
    /// `NotConnected` until the user reconnects to the same peer id.
    pub fn connection_lost(
        &mut self,
        peer_id: &str,
        connection_id: u64,
        reason: String,
    ) -> Vec<ChatEvent> {
        let registered = self
            .registry
            .lookup(peer_id)
            .map(|handle| handle.connection_id());
        if registered != Some(connection_id) {
            debug!(peer = %peer_id, connection_id, "close for superseded connection");
            return Vec::new();
        }

        self.registry.remove(peer_id);
        info!(peer = %peer_id, %reason, "connection lost");
        vec![ChatEvent::PeerDisconnected {
            peer_id: peer_id.to_string(),
            reason,
        }]
    }

    // ==================== Message paths ====================

    /// Send `text` to the active conversation's peer.
    ///
    /// Transmits first, then appends to local history. The caller clears
    /// its composition buffer on success.
    pub fn send_message(&mut self, text: &str) -> Result<Vec<ChatEvent>> {
        if text.trim().is_empty() {
            return Err(Error::EmptyMessage);
        }
        if text.len() > self.max_message_bytes {
            return Err(Error::MessageTooLarge {
                size: text.len(),
                max: self.max_message_bytes,
            });
        }

        let conversation = self.store.active().ok_or(Error::NoActiveConversation)?;
        let id = conversation.id.clone();
        let peer_id = conversation.peer_id.clone();

        let handle = self
            .registry
            .lookup(&peer_id)
            .ok_or_else(|| Error::NotConnected(peer_id.clone()))?;
        handle.send(text)?;

        self.store.append_message(&id, Message::outgoing(text.to_string()))?;
        debug!(peer = %peer_id, bytes = text.len(), "message sent");

        Ok(vec![ChatEvent::MessageSent { id }])
    }

    /// Route one inbound payload to the conversation matching its peer.
    ///
    /// A payload for a peer with no conversation leaves the store unchanged
    /// and is reported as [`Error::NoConversation`]; connections always
    /// create their conversation up front, so this indicates a peer writing
    /// outside the protocol.
    pub fn handle_inbound(&mut self, peer_id: &str, text: String) -> Result<Vec<ChatEvent>> {
        let id = self
            .store
            .find_by_peer(peer_id)
            .map(|c| c.id.clone())
            .ok_or_else(|| Error::NoConversation(peer_id.to_string()))?;

        self.store.append_message(&id, Message::incoming(text))?;
        debug!(peer = %peer_id, "message received");

        Ok(vec![ChatEvent::MessageReceived { id }])
    }

    /// Dispatch one transport event.
    pub fn handle_transport_event(&mut self, event: TransportEvent) -> Result<Vec<ChatEvent>> {
        match event {
            TransportEvent::Connected {
                handle, direction, ..
            } => Ok(self.connection_established(handle, direction)),
            TransportEvent::Data { peer_id, text } => self.handle_inbound(&peer_id, text),
            TransportEvent::Closed {
                peer_id,
                connection_id,
                reason,
            } => Ok(self.connection_lost(&peer_id, connection_id, reason)),
        }
    }

    // ==================== Conversation management ====================

    /// Make a conversation active.
    pub fn activate(&mut self, id: &ConversationId) -> Result<Vec<ChatEvent>> {
        self.store.set_active(id)?;
        Ok(vec![ChatEvent::ActiveChanged {
            id: Some(id.clone()),
        }])
    }

    /// Deactivate the current conversation (the UI's "new conversation"
    /// toggle back to the connect form). Not a store operation.
    pub fn deactivate(&mut self) -> Vec<ChatEvent> {
        self.store.clear_active();
        vec![ChatEvent::ActiveChanged { id: None }]
    }

    /// Rename a conversation. Empty titles are permitted.
    pub fn rename_conversation(
        &mut self,
        id: &ConversationId,
        new_title: String,
    ) -> Result<Vec<ChatEvent>> {
        self.store.rename(id, new_title)?;
        Ok(vec![ChatEvent::ConversationRenamed { id: id.clone() }])
    }

    /// Delete a conversation and drop its connection handle, if any.
    pub fn delete_conversation(&mut self, id: &ConversationId) -> Result<Vec<ChatEvent>> {
        let removed = self.store.delete(id)?;

        if let Some(handle) = self.registry.remove(&removed.peer_id) {
            debug!(peer = %removed.peer_id, "closing connection for deleted conversation");
            drop(handle);
        }

        let mut events = vec![ChatEvent::ConversationDeleted { id: id.clone() }];
        events.push(ChatEvent::ActiveChanged {
            id: self.store.active_id().cloned(),
        });
        Ok(events)
    }

    /// The active conversation, if any.
    pub fn active_conversation(&self) -> Option<&Conversation> {
        self.store.active()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::types::Sender;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn router() -> MessageRouter {
        MessageRouter::new("A1".to_string(), 64 * 1024)
    }

    fn connect_peer(
        router: &mut MessageRouter,
        peer: &str,
    ) -> (ConnectionHandle, UnboundedReceiver<String>) {
        let (handle, rx) = ConnectionHandle::loopback(peer);
        router.connection_established(handle.clone(), Direction::Outbound);
        (handle, rx)
    }

    #[test]
    fn test_validate_connect_target() {
        let router = router();
        assert!(matches!(
            router.validate_connect_target(""),
            Err(Error::EmptyTarget)
        ));
        assert!(matches!(
            router.validate_connect_target("  "),
            Err(Error::EmptyTarget)
        ));
        assert!(matches!(
            router.validate_connect_target("A1"),
            Err(Error::SelfConnection)
        ));
        assert!(router.validate_connect_target("B2").is_ok());
    }

    #[test]
    fn test_self_connection_creates_no_conversation() {
        let router = router();
        assert!(router.validate_connect_target("A1").is_err());
        assert!(router.store().is_empty());
    }

    #[test]
    fn test_connection_creates_and_activates_conversation() {
        let mut router = router();
        let (_handle, _rx) = connect_peer(&mut router, "B2");

        let conversation = router.active_conversation().expect("active conversation");
        assert_eq!(conversation.peer_id, "B2");
        assert_eq!(conversation.title, "Chat with B2...");
    }

    #[test]
    fn test_send_and_receive_scenario() {
        let mut router = router();
        let (_handle, mut rx) = connect_peer(&mut router, "B2");

        let events = router.send_message("Hello").unwrap();
        assert!(matches!(events[0], ChatEvent::MessageSent { .. }));
        assert_eq!(rx.try_recv().unwrap(), "Hello");

        router.handle_inbound("B2", "Hi".to_string()).unwrap();

        let messages = &router.active_conversation().unwrap().messages;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].sender, Sender::You);
        assert_eq!(messages[0].content, "Hello");
        assert_eq!(messages[1].sender, Sender::Remote);
        assert_eq!(messages[1].content, "Hi");
    }

    #[test]
    fn test_send_requires_active_conversation() {
        let mut router = router();
        assert!(matches!(
            router.send_message("Hello"),
            Err(Error::NoActiveConversation)
        ));
    }

    #[test]
    fn test_send_rejects_empty_and_oversized() {
        let mut router = MessageRouter::new("A1".to_string(), 8);
        let (_handle, _rx) = connect_peer(&mut router, "B2");

        assert!(matches!(router.send_message("  "), Err(Error::EmptyMessage)));
        assert!(matches!(
            router.send_message("123456789"),
            Err(Error::MessageTooLarge { .. })
        ));
        assert!(router.active_conversation().unwrap().messages.is_empty());
    }

    #[test]
    fn test_send_without_handle_is_explicit_error() {
        let mut router = router();
        let (handle, _rx) = connect_peer(&mut router, "B2");
        router.connection_lost("B2", handle.connection_id(), "peer went away".to_string());

        let err = router.send_message("Hello").unwrap_err();
        assert!(matches!(err, Error::NotConnected(_)));
        // Nothing was appended for the failed send.
        assert!(router.active_conversation().unwrap().messages.is_empty());
    }

    #[test]
    fn test_inbound_for_unknown_peer_leaves_store_unchanged() {
        let mut router = router();
        let (_handle, _rx) = connect_peer(&mut router, "B2");

        let err = router.handle_inbound("C3", "hello?".to_string()).unwrap_err();
        assert!(matches!(err, Error::NoConversation(_)));
        assert_eq!(router.store().len(), 1);
        assert!(router.store().find_by_peer("B2").unwrap().messages.is_empty());
    }

    #[test]
    fn test_inbound_targets_only_matching_conversation() {
        let mut router = router();
        let (_hb, _rx_b) = connect_peer(&mut router, "B2");
        let (_hc, _rx_c) = connect_peer(&mut router, "C3");

        router.handle_inbound("B2", "for B".to_string()).unwrap();

        assert_eq!(router.store().find_by_peer("B2").unwrap().messages.len(), 1);
        assert!(router.store().find_by_peer("C3").unwrap().messages.is_empty());
    }

    #[test]
    fn test_reconnect_reuses_conversation() {
        let mut router = router();
        let (handle, _rx) = connect_peer(&mut router, "B2");
        router.send_message("Hello").unwrap();
        router.connection_lost("B2", handle.connection_id(), "lost".to_string());

        let events = {
            let (handle, _rx2) = ConnectionHandle::loopback("B2");
            router.connection_established(handle, Direction::Outbound)
        };

        // No new conversation; history is intact.
        assert!(!events
            .iter()
            .any(|e| matches!(e, ChatEvent::ConversationCreated { .. })));
        assert_eq!(router.store().len(), 1);
        assert_eq!(router.active_conversation().unwrap().messages.len(), 1);
    }

    #[test]
    fn test_delete_falls_back_and_drops_handle() {
        let mut router = router();
        let (_hb, _rx_b) = connect_peer(&mut router, "B2");
        let (_hc, _rx_c) = connect_peer(&mut router, "C3");

        let active = router.store().active_id().cloned().unwrap();
        let events = router.delete_conversation(&active).unwrap();

        assert!(matches!(events[0], ChatEvent::ConversationDeleted { .. }));
        // Activation fell back to the first remaining conversation.
        let remaining = router.active_conversation().unwrap();
        assert_eq!(remaining.peer_id, "B2");
        assert!(!router.is_connected("C3"));
    }

    #[test]
    fn test_rename_allows_empty() {
        let mut router = router();
        let (_handle, _rx) = connect_peer(&mut router, "B2");
        let id = router.store().active_id().cloned().unwrap();

        router.rename_conversation(&id, String::new()).unwrap();
        assert_eq!(router.store().get(&id).unwrap().title, "");
    }

    #[test]
    fn test_deactivate_is_ui_toggle_only() {
        let mut router = router();
        let (_handle, _rx) = connect_peer(&mut router, "B2");

        let events = router.deactivate();
        assert_eq!(events, vec![ChatEvent::ActiveChanged { id: None }]);
        assert_eq!(router.store().len(), 1);
        assert!(router.active_conversation().is_none());
    }

    #[test]
    fn test_stale_close_is_ignored() {
        let mut router = router();
        let events = router.connection_lost("B2", 42, "never connected".to_string());
        assert!(events.is_empty());
    }

    #[test]
    fn test_close_of_displaced_connection_keeps_live_handle() {
        let mut router = router();
        let (first, _rx1) = connect_peer(&mut router, "B2");

        // A redial displaces the first connection.
        let (second, mut rx2) = ConnectionHandle::loopback("B2");
        router.connection_established(second, Direction::Inbound);

        // The displaced connection's reader reports its close afterwards;
        // the fresh handle must stay registered.
        let events =
            router.connection_lost("B2", first.connection_id(), "stream finished".to_string());
        assert!(events.is_empty());
        assert!(router.is_connected("B2"));

        router.send_message("still here").unwrap();
        assert_eq!(rx2.try_recv().unwrap(), "still here");
    }
}
