//! Conversation data model shared by the streaming pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Key of a conversation in the message store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub Uuid);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Message identifier.
///
/// A `Provisional` id is a client-generated placeholder assigned before the
/// server confirms the real one; the server-issued `Confirmed` id replaces
/// it exactly once per stream session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum MessageId {
    Provisional(Uuid),
    Confirmed(i64),
}

impl MessageId {
    /// Generate a fresh provisional id.
    pub fn provisional() -> Self {
        Self::Provisional(Uuid::new_v4())
    }

    pub fn is_provisional(&self) -> bool {
        matches!(self, Self::Provisional(_))
    }
}

/// Message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

/// A single message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender: Sender,
    pub text: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<u32>,
}

impl ChatMessage {
    /// Create a user message under the given (usually provisional) id.
    pub fn user(id: MessageId, conversation_id: ConversationId, text: impl Into<String>) -> Self {
        Self {
            id,
            conversation_id,
            sender: Sender::User,
            text: text.into(),
            created_at: Utc::now(),
            prompt_tokens: None,
            completion_tokens: None,
        }
    }

    /// Create an empty assistant message ready to receive streamed deltas.
    pub fn assistant_placeholder(id: MessageId, conversation_id: ConversationId) -> Self {
        Self {
            id,
            conversation_id,
            sender: Sender::Assistant,
            text: String::new(),
            created_at: Utc::now(),
            prompt_tokens: None,
            completion_tokens: None,
        }
    }
}
