//! Error types for the core library.

use thiserror::Error;

/// Main error type for the core library.
#[derive(Error, Debug)]
pub enum Error {
    /// Connect target is empty
    #[error("peer id cannot be empty")]
    EmptyTarget,

    /// Attempted to connect to our own peer id
    #[error("cannot connect to yourself")]
    SelfConnection,

    /// Message text is empty
    #[error("message cannot be empty")]
    EmptyMessage,

    /// Message exceeds the configured size cap
    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// No live connection for a peer
    #[error("not connected to peer {0}")]
    NotConnected(String),

    /// Inbound payload for a peer with no conversation
    #[error("no conversation for peer {0}")]
    NoConversation(String),

    /// Conversation id does not reference an existing conversation
    #[error("conversation not found: {0}")]
    ConversationNotFound(String),

    /// A conversation already exists for this peer
    #[error("conversation already exists for peer {0}")]
    DuplicateConversation(String),

    /// No conversation is active
    #[error("no active conversation")]
    NoActiveConversation,

    /// Connection attempt timed out
    #[error("connection to {0} timed out")]
    ConnectTimeout(String),

    /// Transport-level failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Identity error
    #[error("identity error: {0}")]
    Identity(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}
