//! Messages exchanged between the relay server and its clients.
//!
//! Every WebSocket text frame carries exactly one of these, JSON encoded with
//! a `type` tag.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One entry of the conversation history sent with every `ask`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }
}

/// Client -> server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Ask { messages: Vec<ConversationTurn> },
}

/// Server -> client. A turn is `Ack`, any number of `Chunk`s, then exactly
/// one of `Done` or `Error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    Ack,
    Chunk { text: String },
    Done,
    Error { error: String },
}

impl ServerMessage {
    pub fn chunk(text: impl Into<String>) -> Self {
        ServerMessage::Chunk { text: text.into() }
    }

    pub fn error(error: impl Into<String>) -> Self {
        ServerMessage::Error { error: error.into() }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ServerMessage::Done | ServerMessage::Error { .. })
    }
}
