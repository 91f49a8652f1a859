//! Shared types for conversations, stream events, and auth payloads

pub mod messages;

pub use messages::{ChatMessage, ChatRequest, Role, StreamEvent, Token, UserProfile};
