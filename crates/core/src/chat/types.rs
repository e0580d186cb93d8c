//! Core data types for conversations and messages.

use chrono::{DateTime, Utc};

/// Number of leading peer-id characters used in a default conversation title.
const TITLE_PEER_CHARS: usize = 10;

/// Unique identifier for a conversation.
///
/// Conversation ids are local tokens; peer ids come from the transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversationId(pub String);

impl ConversationId {
    /// Create a new random conversation ID.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ConversationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Who authored a message, relative to this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    /// Authored locally.
    You,
    /// Authored by the remote peer.
    Remote,
}

impl Sender {
    /// Get a display label for this sender.
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::You => "You",
            Sender::Remote => "Remote",
        }
    }
}

/// A single chat message. Raw Markdown source; rendering happens at display.
/// The wire carries only the raw text, so nothing here is serialized.
#[derive(Debug, Clone)]
pub struct Message {
    /// Who authored the message.
    pub sender: Sender,
    /// Message content (raw Markdown).
    pub content: String,
    /// When the message was sent or received locally (UTC).
    pub sent_at: DateTime<Utc>,
}

impl Message {
    /// Create a locally-authored message.
    pub fn outgoing(content: String) -> Self {
        Self {
            sender: Sender::You,
            content,
            sent_at: Utc::now(),
        }
    }

    /// Create a message received from the remote peer.
    pub fn incoming(content: String) -> Self {
        Self {
            sender: Sender::Remote,
            content,
            sent_at: Utc::now(),
        }
    }
}

/// One conversation thread with a single remote peer.
#[derive(Debug, Clone)]
pub struct Conversation {
    /// Unique conversation identifier.
    pub id: ConversationId,
    /// Mutable display title. Empty titles are permitted.
    pub title: String,
    /// Remote peer's endpoint ID. Immutable after creation.
    pub peer_id: String,
    /// Ordered message history. Append-only.
    pub messages: Vec<Message>,
    /// When the conversation was created (UTC).
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    /// Create a new conversation for a peer.
    pub fn new(peer_id: String, title: String) -> Self {
        Self {
            id: ConversationId::new(),
            title,
            peer_id,
            messages: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// The most recent message, if any.
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }
}

/// Default conversation title derived from a (possibly long) peer id.
pub fn title_for_peer(peer_id: &str) -> String {
    let short: String = peer_id.chars().take(TITLE_PEER_CHARS).collect();
    format!("Chat with {}...", short)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_id_generation() {
        let id1 = ConversationId::new();
        let id2 = ConversationId::new();
        assert_ne!(id1, id2);
        assert!(!id1.as_str().is_empty());
    }

    #[test]
    fn test_sender_labels() {
        assert_eq!(Sender::You.as_str(), "You");
        assert_eq!(Sender::Remote.as_str(), "Remote");
    }

    #[test]
    fn test_title_for_peer() {
        assert_eq!(title_for_peer("B2"), "Chat with B2...");
        let long = "k51qzi5uqu5dgutdk6i1y2nlqwjonuc5lab2dmfgf";
        assert_eq!(title_for_peer(long), "Chat with k51qzi5uqu...");
    }

    #[test]
    fn test_message_constructors() {
        let out = Message::outgoing("hi".to_string());
        assert_eq!(out.sender, Sender::You);
        let inc = Message::incoming("hey".to_string());
        assert_eq!(inc.sender, Sender::Remote);
    }
}
