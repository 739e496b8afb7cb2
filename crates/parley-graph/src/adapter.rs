use async_trait::async_trait;

use parley_core::ids::{GuildId, MessageId, UserId};

use crate::error::GraphError;
use crate::message::Message;

/// The out-of-scope chat gateway, narrowed to the operations the reasoning
/// core needs. A real deployment backs this with whatever platform SDK is
/// in play; the core only ever sees this trait.
#[async_trait]
pub trait ChatAdapter: Send + Sync {
    /// Fetch one message by id. `Ok(None)` means "no such message", which
    /// the graph builder treats identically to a failed fetch: absent.
    async fn fetch_message(
        &self,
        guild_id: GuildId,
        id: MessageId,
    ) -> Result<Option<Message>, GraphError>;

    /// Fetch up to `limit` messages strictly before `before_id` in channel
    /// order, newest first. Real gateways cap this around a hundred
    /// messages per call; the coalesced fetch cache is built around that
    /// assumption (see `graph::CachedHistoryFetcher`).
    async fn fetch_history(
        &self,
        guild_id: GuildId,
        before_id: MessageId,
        limit: usize,
    ) -> Result<Vec<Message>, GraphError>;

    async fn send_reply(
        &self,
        guild_id: GuildId,
        in_reply_to: MessageId,
        content: &str,
    ) -> Result<MessageId, GraphError>;

    async fn delete_message(&self, guild_id: GuildId, id: MessageId) -> Result<(), GraphError>;

    async fn add_reaction(
        &self,
        guild_id: GuildId,
        id: MessageId,
        emoji: &str,
    ) -> Result<(), GraphError>;
}

/// Resolves user ids to display names for mention substitution (C5).
/// Resolution is best-effort: callers fall back to a synthesized name on
/// failure rather than propagate an error.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn display_name(&self, guild_id: GuildId, user_id: UserId) -> Option<String>;
}
