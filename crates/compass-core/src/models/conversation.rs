//! Conversations, messages, and the send-message exchange.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub sender: Sender,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: JsonValue,
    #[serde(default)]
    pub response_time: Option<f64>,
    #[serde(default)]
    pub model_used: Option<String>,
}

/// A conversation with its full, ordered message history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message_count: u32,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Exists only client-side until the server assigns a durable id.
    #[serde(skip)]
    pub pending: bool,
}

impl Conversation {
    /// Optimistic placeholder shown while the server creates the real one.
    pub fn pending(title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            message_count: 0,
            messages: Vec::new(),
            created_at: Some(Utc::now()),
            updated_at: None,
            pending: true,
        }
    }

    pub fn summary(&self) -> ConversationSummary {
        ConversationSummary {
            id: self.id,
            title: self.title.clone(),
            message_count: self.message_count,
            last_message: self.messages.last().map(LastMessage::from),
            created_at: self.created_at,
            updated_at: self.updated_at,
            pending: self.pending,
        }
    }
}

/// Preview of the most recent message in a conversation list entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastMessage {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub content: String,
    pub sender: Sender,
    pub created_at: DateTime<Utc>,
}

impl From<&Message> for LastMessage {
    fn from(message: &Message) -> Self {
        Self {
            content: message.content.chars().take(100).collect(),
            sender: message.sender,
            created_at: message.created_at,
        }
    }
}

/// Conversation list entry (no message bodies).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: Uuid,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message_count: u32,
    #[serde(default)]
    pub last_message: Option<LastMessage>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub pending: bool,
}

/// Body of the send-message endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SendMessageRequest {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<Uuid>,
    pub use_rag: bool,
    /// Diagnostic hint only; the server does not rely on it.
    pub metadata: JsonValue,
}

/// Conversation header returned alongside a reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRef {
    pub id: Uuid,
    #[serde(default)]
    pub title: String,
    pub message_count: u32,
}

/// Server's account of the retrieval used for a reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RagInfo {
    #[serde(default)]
    pub rag_used: bool,
    #[serde(default)]
    pub rag_stats: JsonValue,
    #[serde(default)]
    pub contexts_used: u32,
    #[serde(default)]
    pub has_context: bool,
}

/// Response of the send-message endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendMessageResponse {
    pub conversation_id: Uuid,
    pub user_message: Message,
    pub ai_message: Message,
    pub conversation: ConversationRef,
    #[serde(default)]
    pub rag_info: RagInfo,
}

/// Body of the conversation create endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateConversationRequest {
    pub title: String,
}
