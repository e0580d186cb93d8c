//! parley core library
//!
//! This crate provides the core functionality for parley, a peer-to-peer
//! Markdown chat client:
//! - Conversation store and message routing
//! - Connection registry
//! - Transport endpoint, identity, and per-connection tasks
//! - Markdown rendering
//! - Configuration management
//!
//! All chat state is in-memory; nothing but the endpoint keypair and the
//! config file is ever written to disk.

pub mod chat;
pub mod config;
pub mod error;
pub mod markdown;
pub mod platform;
pub mod registry;
pub mod transport;

// Re-export commonly used types
pub use chat::{ChatEvent, Conversation, ConversationId, Message, MessageRouter, Sender};
pub use config::Config;
pub use error::{Error, Result};
pub use registry::ConnectionRegistry;
pub use transport::{
    ChatEndpoint, ConnectionHandle, Direction, Identity, TransportEvent, ALPN_CHAT,
};
