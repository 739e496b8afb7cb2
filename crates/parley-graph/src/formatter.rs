use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;
use regex::Regex;

use parley_core::ids::{GuildId, UserId};

use crate::adapter::UserDirectory;
use crate::message::ConversationMessage;

/// Bound on the mention-substitution cache. Unlike `skynet-users::resolver`'s
/// hand-rolled Vec-backed eviction, this reaches for the `lru` crate directly
/// — the teacher's own comment on that cache calls it a stopgap "until we
/// have profiling data that justifies a real LRU crate".
const MENTION_CACHE_CAPACITY: usize = 2048;

fn mention_pattern() -> &'static Regex {
    static PATTERN: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<@!?(\d+)>").expect("static mention pattern is valid"))
}

/// Renders conversation history into the canonical XML form the providers
/// are prompted with, substituting mention tokens for resolved display
/// names along the way.
pub struct ConversationFormatter {
    directory: Arc<dyn UserDirectory>,
    mention_cache: Mutex<LruCache<(GuildId, UserId), String>>,
}

impl ConversationFormatter {
    pub fn new(directory: Arc<dyn UserDirectory>) -> Self {
        Self {
            directory,
            mention_cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(MENTION_CACHE_CAPACITY).expect("capacity is nonzero"),
            )),
        }
    }

    /// Resolves a mentioned user's display name, caching per `(guild_id,
    /// user_id)`. Falls back to `User(ID:N)` when resolution fails — this
    /// never propagates an error.
    async fn resolve_mention(&self, guild_id: GuildId, user_id: UserId) -> String {
        if let Some(cached) = self.mention_cache.lock().unwrap().get(&(guild_id, user_id)) {
            return cached.clone();
        }

        let resolved = self
            .directory
            .display_name(guild_id, user_id)
            .await
            .unwrap_or_else(|| format!("User(ID:{user_id})"));

        self.mention_cache
            .lock()
            .unwrap()
            .put((guild_id, user_id), resolved.clone());
        resolved
    }

    async fn substitute_mentions(&self, guild_id: GuildId, content: &str) -> String {
        let mut result = String::with_capacity(content.len());
        let mut last_end = 0;

        for caps in mention_pattern().captures_iter(content) {
            let whole = caps.get(0).unwrap();
            let Ok(raw_id) = caps[1].parse::<u64>() else {
                continue;
            };
            result.push_str(&content[last_end..whole.start()]);
            result.push_str(&self.resolve_mention(guild_id, UserId(raw_id)).await);
            last_end = whole.end();
        }
        result.push_str(&content[last_end..]);
        result
    }

    fn render_one(message_id: u64, reply_to: Option<String>, timestamp: &str, author: &str, content: &str) -> String {
        let mut out = String::new();
        out.push_str("<message>\n");
        out.push_str(&format!("<id>{message_id}</id>\n"));
        if let Some(reply_to) = reply_to {
            out.push_str(&format!("<reply_to>{reply_to}</reply_to>\n"));
        }
        out.push_str(&format!("<timestamp>{timestamp}</timestamp>\n"));
        out.push_str(&format!("<author>{author}</author>\n"));
        out.push_str(&format!("<content>{content}</content>\n"));
        out.push_str("</message>");
        out
    }

    /// Renders a full conversation as `<conversation_history>…</conversation_history>`.
    pub async fn format(&self, guild_id: GuildId, messages: &[ConversationMessage]) -> String {
        let mut rendered = Vec::with_capacity(messages.len());
        for m in messages {
            let content = self.substitute_mentions(guild_id, &m.content).await;
            let author = self.resolve_mention(guild_id, m.author_id).await;
            rendered.push(Self::render_one(
                m.message_id.0,
                m.reply_to_id.map(|id| id.0.to_string()),
                &m.timestamp,
                &author,
                &content,
            ));
        }

        format!(
            "<conversation_history>\n{}\n</conversation_history>",
            rendered.join("\n")
        )
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::Utc;

    use super::*;
    use parley_core::ids::MessageId;

    struct FixedDirectory;

    #[async_trait]
    impl UserDirectory for FixedDirectory {
        async fn display_name(&self, _guild_id: GuildId, user_id: UserId) -> Option<String> {
            if user_id.0 == 42 {
                Some("Ada".to_string())
            } else {
                None
            }
        }
    }

    fn msg(id: u64, author: u64, content: &str, reply_to: Option<u64>) -> ConversationMessage {
        ConversationMessage {
            message_id: MessageId(id),
            author_id: UserId(author),
            content: content.to_string(),
            timestamp: Utc::now().to_rfc3339(),
            mentioned_user_ids: vec![],
            reply_to_id: reply_to.map(MessageId),
        }
    }

    #[tokio::test]
    async fn substitutes_known_mention() {
        let formatter = ConversationFormatter::new(Arc::new(FixedDirectory));
        let out = formatter
            .format(GuildId(1), &[msg(1, 42, "hey <@42> look", None)])
            .await;
        assert!(out.contains("hey Ada look"));
    }

    #[tokio::test]
    async fn falls_back_for_unknown_mention() {
        let formatter = ConversationFormatter::new(Arc::new(FixedDirectory));
        let out = formatter
            .format(GuildId(1), &[msg(1, 42, "ping <@99>", None)])
            .await;
        assert!(out.contains("ping User(ID:99)"));
    }

    #[tokio::test]
    async fn omits_reply_to_when_absent() {
        let formatter = ConversationFormatter::new(Arc::new(FixedDirectory));
        let out = formatter.format(GuildId(1), &[msg(1, 42, "hi", None)]).await;
        assert!(!out.contains("<reply_to>"));
    }

    #[tokio::test]
    async fn includes_reply_to_when_present() {
        let formatter = ConversationFormatter::new(Arc::new(FixedDirectory));
        let out = formatter
            .format(GuildId(1), &[msg(2, 42, "reply", Some(1))])
            .await;
        assert!(out.contains("<reply_to>1</reply_to>"));
    }
}
