//! Conversation management for peer-to-peer Markdown chat.
//!
//! This module holds the domain core:
//!
//! - Per-peer 1:1 conversation records with append-only message history
//! - The active-conversation pointer and its invariants
//! - The message router that bridges transport events and user intent

pub mod router;
pub mod store;
pub mod types;

pub use router::{ChatEvent, MessageRouter};
pub use store::ConversationStore;
pub use types::*;
