//! Message types exchanged between client, server, and model providers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Speaker of a conversation message
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One message of a conversation
///
/// A conversation is an ordered sequence of these; order is chronological
/// and significant. A message is immutable once sent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// Request body for the chat, reason, and search endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
}

/// A classified fragment of a streamed model response
///
/// `Think` content is a replacement value: the latest full thinking text
/// seen so far. `Response` content is cumulative: the transcript grows and
/// stays prefix-compatible across emissions. Consumers must honor the
/// asymmetry: think overwrites, response replaces with a longer string.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StreamEvent {
    Think { content: String },
    Response { content: String },
}

impl StreamEvent {
    /// Content carried by this event regardless of kind
    pub fn content(&self) -> &str {
        match self {
            StreamEvent::Think { content } | StreamEvent::Response { content } => content,
        }
    }

    pub fn is_think(&self) -> bool {
        matches!(self, StreamEvent::Think { .. })
    }
}

/// Bearer token pair issued at login or registration
///
/// Opaque to the relay. Invalidated by client-side discard only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    pub token_type: String,
}

impl Token {
    pub fn bearer(access_token: String) -> Self {
        Self {
            access_token,
            token_type: "bearer".to_string(),
        }
    }
}

/// Public view of a registered user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}
