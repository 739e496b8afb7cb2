use chrono::{DateTime, Utc};

use parley_core::ids::{MessageId, UserId};

/// An immutable conversation node as handed to us by the chat gateway.
/// Identity is `id`; everything else is a value.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: MessageId,
    pub author_id: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub reply_to_id: Option<MessageId>,
    pub mentioned_user_ids: Vec<UserId>,
    /// Precomputed descriptions of attachments and link embeddings — the
    /// chat gateway resolves these before handing the message to us.
    pub attachment_descriptions: Vec<String>,
}

/// `ConversationMessage` — the rendered form produced by the graph builder
/// and consumed by the formatter (C5) and generator dispatch (C8).
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationMessage {
    pub message_id: MessageId,
    pub author_id: UserId,
    pub content: String,
    pub timestamp: String,
    pub mentioned_user_ids: Vec<UserId>,
    pub reply_to_id: Option<MessageId>,
}

impl From<&Message> for ConversationMessage {
    fn from(m: &Message) -> Self {
        ConversationMessage {
            message_id: m.id,
            author_id: m.author_id,
            content: m.content.clone(),
            timestamp: m.created_at.to_rfc3339(),
            mentioned_user_ids: m.mentioned_user_ids.clone(),
            reply_to_id: m.reply_to_id,
        }
    }
}
