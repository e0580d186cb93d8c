//! In-memory conversation storage.
//!
//! Conversations live only for the lifetime of the process; there is no
//! on-disk history. The store owns every conversation record and the
//! active-conversation pointer, and upholds two invariants:
//!
//! - the active id, when set, always references an existing conversation
//! - a peer id appears in at most one open conversation

use crate::chat::types::{Conversation, ConversationId, Message};
use crate::error::{Error, Result};

/// Ordered collection of conversations plus the active-conversation pointer.
#[derive(Debug, Default)]
pub struct ConversationStore {
    conversations: Vec<Conversation>,
    active: Option<ConversationId>,
}

impl ConversationStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new conversation for a peer and return a reference to it.
    ///
    /// Fails with [`Error::DuplicateConversation`] if a conversation for the
    /// peer already exists; callers reconnecting to a known peer should use
    /// [`find_by_peer`](Self::find_by_peer) first.
    pub fn create(&mut self, peer_id: &str, title: String) -> Result<&Conversation> {
        if self.find_by_peer(peer_id).is_some() {
            return Err(Error::DuplicateConversation(peer_id.to_string()));
        }
        self.conversations
            .push(Conversation::new(peer_id.to_string(), title));
        Ok(self.conversations.last().unwrap())
    }

    /// Get a conversation by id.
    pub fn get(&self, id: &ConversationId) -> Option<&Conversation> {
        self.conversations.iter().find(|c| &c.id == id)
    }

    /// Find the conversation for a remote peer, if one exists.
    pub fn find_by_peer(&self, peer_id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.peer_id == peer_id)
    }

    /// All conversations, in creation order.
    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    /// Number of open conversations.
    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    /// Whether the store holds no conversations.
    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    /// Remove a conversation.
    ///
    /// If it was active, activation falls back to the first remaining
    /// conversation, or to none when the store is empty.
    pub fn delete(&mut self, id: &ConversationId) -> Result<Conversation> {
        let index = self
            .conversations
            .iter()
            .position(|c| &c.id == id)
            .ok_or_else(|| Error::ConversationNotFound(id.to_string()))?;

        let removed = self.conversations.remove(index);

        if self.active.as_ref() == Some(id) {
            self.active = self.conversations.first().map(|c| c.id.clone());
        }

        Ok(removed)
    }

    /// Change a conversation's title in place. Empty titles are permitted.
    pub fn rename(&mut self, id: &ConversationId, new_title: String) -> Result<()> {
        let conversation = self
            .conversations
            .iter_mut()
            .find(|c| &c.id == id)
            .ok_or_else(|| Error::ConversationNotFound(id.to_string()))?;
        conversation.title = new_title;
        Ok(())
    }

    /// Append a message to a conversation's history.
    pub fn append_message(&mut self, id: &ConversationId, message: Message) -> Result<()> {
        let conversation = self
            .conversations
            .iter_mut()
            .find(|c| &c.id == id)
            .ok_or_else(|| Error::ConversationNotFound(id.to_string()))?;
        conversation.messages.push(message);
        Ok(())
    }

    /// Make a conversation active. The id must reference an existing record.
    pub fn set_active(&mut self, id: &ConversationId) -> Result<()> {
        if self.get(id).is_none() {
            return Err(Error::ConversationNotFound(id.to_string()));
        }
        self.active = Some(id.clone());
        Ok(())
    }

    /// Deactivate the current conversation (back to the connect form).
    pub fn clear_active(&mut self) {
        self.active = None;
    }

    /// Id of the active conversation, if any.
    pub fn active_id(&self) -> Option<&ConversationId> {
        self.active.as_ref()
    }

    /// The active conversation record, if any.
    pub fn active(&self) -> Option<&Conversation> {
        self.active.as_ref().and_then(|id| self.get(id))
    }
}
