use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use futures_util::future::join_all;
use lru::LruCache;
use serde_json::json;
use tracing::{debug, warn};

use parley_core::ids::{GuildId, MessageId, UserId};
use parley_graph::{ConversationFormatter, ConversationMessage, UserDirectory};
use parley_providers::{structured, ChatRequest, LlmProvider};

use crate::cache::DistributedCache;
use crate::error::MemoryError;
use crate::store::DurableStore;
use crate::types::{
    AliasExtractionResponse, CachedDailySummary, DailySummariesResponse, DailySummaryMap, DatedSummary,
    IngestedMessage, MergeContextResponse,
};

fn stale_after() -> ChronoDuration {
    ChronoDuration::hours(1)
}
const MERGE_CACHE_CAPACITY: usize = 500;
const ALIAS_CACHE_CAPACITY: usize = 256;

const MERGE_CONTEXT_PROMPT: &str = "Merge the factual memory with daily summaries from the past week for the user.\n\nGuidelines:\n- Prioritize factual information for accuracy\n- Preserve specific events and conversations from recent days\n- Identify patterns across the full week while maintaining detail\n- Resolve conflicts intelligently, favoring factual data then more recent summaries\n- Provide unified context with rich recent memory for personalized conversation";

const BATCH_SUMMARIZE_DAILY_PROMPT: &str = "Analyze the provided chat messages and create concise daily summaries for each active user.\n\nFor each user, focus on:\n- Notable events or experiences they mentioned\n- Their mood and emotional state\n- Important interactions and topics they discussed\n- Behavioral patterns they exhibited\n- Information revealed about them through their messages or messages from others\n\nKeep each summary in the third person.\nReturn a list of summaries, one for each active user.";

const ALIAS_EXTRACTION_PROMPT: &str = "Extract a short list of nicknames or alternate names this user goes by, based only on the facts below. Return an empty list if none are evident.";

fn merge_context_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": { "context": { "type": "string" } },
        "required": ["context"]
    })
}

fn daily_summaries_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "summaries": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "user_id": { "type": "integer" },
                        "summary": { "type": "string" }
                    },
                    "required": ["user_id", "summary"]
                }
            }
        },
        "required": ["summaries"]
    })
}

fn alias_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": { "aliases": { "type": "array", "items": { "type": "string" } } },
        "required": ["aliases"]
    })
}

type MergeCacheKey = (GuildId, UserId, String, String);

/// The memory manager (C6): facts, a rolling week of daily summaries and an
/// AI-merged narrative combining them, assembled with failure isolation
/// between users and between dates.
pub struct MemoryManager {
    store: Arc<dyn DurableStore>,
    cache: Arc<dyn DistributedCache>,
    daily_summary_provider: Arc<dyn LlmProvider>,
    daily_summary_model: String,
    merge_provider: Arc<dyn LlmProvider>,
    merge_model: String,
    formatter: Arc<ConversationFormatter>,
    directory: Arc<dyn UserDirectory>,
    merge_cache: Mutex<LruCache<MergeCacheKey, String>>,
    alias_cache: Mutex<LruCache<String, Vec<String>>>,
}

impl MemoryManager {
    pub fn new(
        store: Arc<dyn DurableStore>,
        cache: Arc<dyn DistributedCache>,
        daily_summary_provider: Arc<dyn LlmProvider>,
        daily_summary_model: impl Into<String>,
        merge_provider: Arc<dyn LlmProvider>,
        merge_model: impl Into<String>,
        formatter: Arc<ConversationFormatter>,
        directory: Arc<dyn UserDirectory>,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            cache,
            daily_summary_provider,
            daily_summary_model: daily_summary_model.into(),
            merge_provider,
            merge_model: merge_model.into(),
            formatter,
            directory,
            merge_cache: Mutex::new(LruCache::new(NonZeroUsize::new(MERGE_CACHE_CAPACITY).unwrap())),
            alias_cache: Mutex::new(LruCache::new(NonZeroUsize::new(ALIAS_CACHE_CAPACITY).unwrap())),
        })
    }

    /// Normalizes and persists an inbound message for later summarization.
    pub async fn ingest_message(
        &self,
        guild_id: GuildId,
        message: &IngestedMessage,
    ) -> Result<(), MemoryError> {
        self.store.add_chat_message(guild_id, message).await
    }

    /// Returns each requested user's merged memory string, or `None` when
    /// nothing is known about them. Per-user failures never block others.
    pub async fn get_memories(
        self: &Arc<Self>,
        guild_id: GuildId,
        user_ids: &[UserId],
    ) -> HashMap<UserId, Option<String>> {
        if user_ids.is_empty() {
            return HashMap::new();
        }

        let today = Utc::now().date_naive();
        let dates: Vec<NaiveDate> = (0..7i64).map(|i| today - ChronoDuration::days(i)).collect();

        let summaries_by_date = join_all(dates.iter().map(|d| self.daily_summary(guild_id, *d))).await;

        let mut per_user_dates: HashMap<UserId, Vec<DatedSummary>> = HashMap::new();
        for (date, map) in dates.iter().zip(summaries_by_date.iter()) {
            for (uid, summary) in map {
                per_user_dates.entry(*uid).or_default().push(DatedSummary {
                    date: *date,
                    summary: summary.clone(),
                });
            }
        }

        let facts_results = join_all(
            user_ids
                .iter()
                .map(|uid| self.store.get_user_facts(guild_id, *uid)),
        )
        .await;

        let merge_futs = user_ids.iter().zip(facts_results).map(|(uid, facts_result)| {
            let facts = match facts_result {
                Ok(f) => f,
                Err(e) => {
                    warn!(err = %e, user_id = %uid, "facts lookup failed, proceeding without them");
                    None
                }
            };
            let dated = per_user_dates.remove(uid).unwrap_or_default();
            self.create_user_memory(guild_id, *uid, facts, dated)
        });

        let merged = join_all(merge_futs).await;

        user_ids.iter().copied().zip(merged).collect()
    }

    async fn create_user_memory(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        facts: Option<String>,
        daily: Vec<DatedSummary>,
    ) -> Option<String> {
        match (facts, daily.len()) {
            (None, 0) => None,
            (Some(facts), 0) => Some(facts),
            (None, 1) => Some(daily.into_iter().next().unwrap().summary),
            (facts, _) => self.merge_context(guild_id, user_id, facts, daily).await,
        }
    }

    async fn daily_summary(self: &Arc<Self>, guild_id: GuildId, date: NaiveDate) -> DailySummaryMap {
        if date == Utc::now().date_naive() {
            self.daily_summary_today(guild_id, date).await
        } else {
            self.daily_summary_historical(guild_id, date).await
        }
    }

    async fn daily_summary_today(self: &Arc<Self>, guild_id: GuildId, date: NaiveDate) -> DailySummaryMap {
        match self.cache.get_daily_summary(guild_id, date).await {
            Some(entry) => {
                if Utc::now().signed_duration_since(entry.created_at) >= stale_after() {
                    self.schedule_rebuild(guild_id, date);
                }
                entry.summaries
            }
            None => {
                self.schedule_rebuild(guild_id, date);
                DailySummaryMap::new()
            }
        }
    }

    fn schedule_rebuild(self: &Arc<Self>, guild_id: GuildId, date: NaiveDate) {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.rebuild_daily_summary(guild_id, date).await });
    }

    async fn rebuild_daily_summary(self: &Arc<Self>, guild_id: GuildId, date: NaiveDate) {
        if !self.cache.try_acquire_build_lock(guild_id, date).await {
            debug!(%guild_id, %date, "lost the daily summary rebuild race, another worker owns it");
            return;
        }

        let summaries = match self.create_daily_summaries(guild_id, date).await {
            Ok(summaries) => summaries,
            Err(e) => {
                warn!(err = %e, %guild_id, %date, "daily summary rebuild failed, caching empty result");
                DailySummaryMap::new()
            }
        };

        let touched: Vec<UserId> = summaries.keys().copied().collect();
        let entry = CachedDailySummary {
            summaries,
            created_at: Utc::now(),
        };
        self.cache.set_daily_summary(guild_id, date, &entry).await;
        self.cache.release_build_lock(guild_id, date).await;

        if !touched.is_empty() {
            let this = Arc::clone(self);
            tokio::spawn(async move { this.get_memories(guild_id, &touched).await });
        }
    }

    async fn daily_summary_historical(&self, guild_id: GuildId, date: NaiveDate) -> DailySummaryMap {
        match self.store.get_daily_summaries(guild_id, date).await {
            Ok(Some(existing)) => return existing,
            Ok(None) => {}
            Err(e) => {
                warn!(err = %e, %guild_id, %date, "historical summary lookup failed");
                return DailySummaryMap::new();
            }
        }

        match self.store.has_chat_messages_for_date(guild_id, date).await {
            Ok(false) => return DailySummaryMap::new(),
            Ok(true) => {}
            Err(e) => {
                warn!(err = %e, %guild_id, %date, "message existence check failed");
                return DailySummaryMap::new();
            }
        }

        match self.create_daily_summaries(guild_id, date).await {
            Ok(summaries) => {
                if let Err(e) = self.store.save_daily_summaries(guild_id, date, &summaries).await {
                    warn!(err = %e, %guild_id, %date, "failed to persist historical daily summary");
                }
                summaries
            }
            Err(e) => {
                warn!(err = %e, %guild_id, %date, "historical daily summary generation failed");
                DailySummaryMap::new()
            }
        }
    }

    async fn create_daily_summaries(
        &self,
        guild_id: GuildId,
        date: NaiveDate,
    ) -> Result<DailySummaryMap, MemoryError> {
        let messages = self.store.get_chat_messages_for_date(guild_id, date).await?;
        if messages.is_empty() {
            return Ok(DailySummaryMap::new());
        }

        let mut active_user_ids: Vec<UserId> = messages.iter().map(|m| m.author_id).collect();
        active_user_ids.sort();
        active_user_ids.dedup();

        let conversation_messages: Vec<ConversationMessage> = messages
            .iter()
            .map(|m| ConversationMessage {
                message_id: MessageId(m.message_id),
                author_id: m.author_id,
                content: m.content.clone(),
                timestamp: m.created_at.to_rfc3339(),
                mentioned_user_ids: vec![],
                reply_to_id: m.reply_to_id.map(MessageId),
            })
            .collect();

        let formatted = self.formatter.format(guild_id, &conversation_messages).await;

        let mut user_list = Vec::with_capacity(active_user_ids.len());
        for uid in &active_user_ids {
            let name = self
                .directory
                .display_name(guild_id, *uid)
                .await
                .unwrap_or_else(|| format!("User(ID:{uid})"));
            let aliases = self.alias_list_for(guild_id, *uid).await;
            let aka = if aliases.is_empty() {
                String::new()
            } else {
                format!("<also_known_as>{}</also_known_as>", aliases.join(", "))
            };
            user_list.push(format!("<user><user_id>{uid}</user_id><name>{name}</name>{aka}</user>"));
        }

        let prompt = format!(
            "<target_users>\n{}\n</target_users>\n<messages>\n{formatted}\n</messages>",
            user_list.join("\n")
        );

        let mut req = ChatRequest::new(self.daily_summary_model.clone(), BATCH_SUMMARIZE_DAILY_PROMPT)
            .with_user_message(prompt);
        req.temperature = 0.0;
        req.response_schema = Some(daily_summaries_schema());

        let response: DailySummariesResponse =
            structured::generate(self.daily_summary_provider.as_ref(), req).await?;

        Ok(response
            .summaries
            .into_iter()
            .map(|s| (UserId(s.user_id), s.summary))
            .collect())
    }

    async fn alias_list_for(&self, guild_id: GuildId, user_id: UserId) -> Vec<String> {
        let facts = match self.store.get_user_facts(guild_id, user_id).await {
            Ok(Some(facts)) if !facts.trim().is_empty() => facts,
            _ => return Vec::new(),
        };

        let cache_key = format!("{:x}", md5::compute(facts.as_bytes()));
        if let Some(cached) = self.alias_cache.lock().unwrap().get(&cache_key) {
            return cached.clone();
        }

        let mut req = ChatRequest::new(self.merge_model.clone(), ALIAS_EXTRACTION_PROMPT)
            .with_user_message(format!("<facts>{facts}</facts>"));
        req.temperature = 0.0;
        req.response_schema = Some(alias_schema());

        match structured::generate::<AliasExtractionResponse>(self.merge_provider.as_ref(), req).await {
            Ok(resp) => {
                self.alias_cache.lock().unwrap().put(cache_key, resp.aliases.clone());
                resp.aliases
            }
            Err(e) => {
                warn!(err = %e, %guild_id, user_id = %user_id, "alias extraction failed");
                Vec::new()
            }
        }
    }

    async fn merge_context(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        facts: Option<String>,
        daily: Vec<DatedSummary>,
    ) -> Option<String> {
        let mut sorted = daily;
        sorted.sort_by_key(|d| d.date);

        let facts_hash = format!("{:x}", md5::compute(facts.as_deref().unwrap_or("").as_bytes()));
        let concat: String = sorted.iter().map(|d| format!("{}:{}", d.date, d.summary)).collect();
        let summaries_hash = format!("{:x}", md5::compute(concat.as_bytes()));
        let key: MergeCacheKey = (guild_id, user_id, facts_hash, summaries_hash);

        if let Some(cached) = self.merge_cache.lock().unwrap().get(&key) {
            return Some(cached.clone());
        }

        let user_name = self
            .directory
            .display_name(guild_id, user_id)
            .await
            .unwrap_or_else(|| format!("User(ID:{user_id})"));

        let daily_xml = if sorted.is_empty() {
            "No daily summaries available.".to_string()
        } else {
            sorted
                .iter()
                .rev()
                .map(|d| {
                    format!(
                        "<daily_summary>\n<date>{}</date>\n<summary>{}</summary>\n</daily_summary>",
                        d.date, d.summary
                    )
                })
                .collect::<Vec<_>>()
                .join("\n")
        };

        let prompt = format!(
            "<user_name>{user_name}</user_name>\n<factual_memory>{}</factual_memory>\n<daily_summaries>\n{daily_xml}\n</daily_summaries>",
            facts.as_deref().unwrap_or("No factual information available.")
        );

        let mut req = ChatRequest::new(self.merge_model.clone(), MERGE_CONTEXT_PROMPT).with_user_message(prompt);
        req.temperature = 0.0;
        req.response_schema = Some(merge_context_schema());

        match structured::generate::<MergeContextResponse>(self.merge_provider.as_ref(), req).await {
            Ok(resp) => {
                self.merge_cache.lock().unwrap().put(key, resp.context.clone());
                Some(resp.context)
            }
            Err(e) => {
                warn!(err = %e, %guild_id, user_id = %user_id, "context merge failed, falling back");
                facts.or_else(|| sorted.last().map(|d| d.summary.clone()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap as StdHashMap, HashSet};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration as StdDuration;

    use async_trait::async_trait;
    use parley_graph::ChatAdapter;
    use parley_providers::{ChatResponse, ProviderError};

    use super::*;

    struct FakeDirectory;

    #[async_trait]
    impl UserDirectory for FakeDirectory {
        async fn display_name(&self, _guild_id: GuildId, user_id: UserId) -> Option<String> {
            Some(format!("user-{user_id}"))
        }
    }

    struct NoopAdapter;

    #[async_trait]
    impl ChatAdapter for NoopAdapter {
        async fn fetch_message(
            &self,
            _g: GuildId,
            _id: MessageId,
        ) -> Result<Option<parley_graph::Message>, parley_graph::GraphError> {
            Ok(None)
        }
        async fn fetch_history(
            &self,
            _g: GuildId,
            _before: MessageId,
            _limit: usize,
        ) -> Result<Vec<parley_graph::Message>, parley_graph::GraphError> {
            Ok(vec![])
        }
        async fn send_reply(
            &self,
            _g: GuildId,
            _r: MessageId,
            _c: &str,
        ) -> Result<MessageId, parley_graph::GraphError> {
            unimplemented!()
        }
        async fn delete_message(&self, _g: GuildId, _id: MessageId) -> Result<(), parley_graph::GraphError> {
            unimplemented!()
        }
        async fn add_reaction(
            &self,
            _g: GuildId,
            _id: MessageId,
            _e: &str,
        ) -> Result<(), parley_graph::GraphError> {
            unimplemented!()
        }
    }

    #[derive(Default)]
    struct FakeStore {
        facts: Mutex<StdHashMap<(u64, u64), String>>,
        historical: Mutex<StdHashMap<(u64, String), DailySummaryMap>>,
        messages: Mutex<StdHashMap<(u64, String), Vec<IngestedMessage>>>,
    }

    #[async_trait]
    impl DurableStore for FakeStore {
        async fn get_user_facts(&self, guild_id: GuildId, user_id: UserId) -> Result<Option<String>, MemoryError> {
            Ok(self.facts.lock().unwrap().get(&(guild_id.0, user_id.0)).cloned())
        }

        async fn set_user_facts(&self, guild_id: GuildId, user_id: UserId, facts: &str) -> Result<(), MemoryError> {
            self.facts
                .lock()
                .unwrap()
                .insert((guild_id.0, user_id.0), facts.to_string());
            Ok(())
        }

        async fn has_chat_messages_for_date(&self, guild_id: GuildId, date: NaiveDate) -> Result<bool, MemoryError> {
            Ok(self
                .messages
                .lock()
                .unwrap()
                .get(&(guild_id.0, date.to_string()))
                .is_some_and(|m| !m.is_empty()))
        }

        async fn get_chat_messages_for_date(
            &self,
            guild_id: GuildId,
            date: NaiveDate,
        ) -> Result<Vec<IngestedMessage>, MemoryError> {
            Ok(self
                .messages
                .lock()
                .unwrap()
                .get(&(guild_id.0, date.to_string()))
                .cloned()
                .unwrap_or_default())
        }

        async fn add_chat_message(&self, guild_id: GuildId, message: &IngestedMessage) -> Result<(), MemoryError> {
            let date = message.created_at.date_naive().to_string();
            self.messages
                .lock()
                .unwrap()
                .entry((guild_id.0, date))
                .or_default()
                .push(message.clone());
            Ok(())
        }

        async fn get_daily_summaries(
            &self,
            guild_id: GuildId,
            date: NaiveDate,
        ) -> Result<Option<DailySummaryMap>, MemoryError> {
            Ok(self.historical.lock().unwrap().get(&(guild_id.0, date.to_string())).cloned())
        }

        async fn save_daily_summaries(
            &self,
            guild_id: GuildId,
            date: NaiveDate,
            summaries: &DailySummaryMap,
        ) -> Result<(), MemoryError> {
            self.historical
                .lock()
                .unwrap()
                .insert((guild_id.0, date.to_string()), summaries.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeCache {
        today: Mutex<StdHashMap<(u64, String), CachedDailySummary>>,
        locks: Mutex<HashSet<(u64, String)>>,
    }

    #[async_trait]
    impl DistributedCache for FakeCache {
        async fn get_daily_summary(&self, guild_id: GuildId, date: NaiveDate) -> Option<CachedDailySummary> {
            self.today.lock().unwrap().get(&(guild_id.0, date.to_string())).cloned()
        }

        async fn set_daily_summary(&self, guild_id: GuildId, date: NaiveDate, entry: &CachedDailySummary) {
            self.today
                .lock()
                .unwrap()
                .insert((guild_id.0, date.to_string()), entry.clone());
        }

        async fn try_acquire_build_lock(&self, guild_id: GuildId, date: NaiveDate) -> bool {
            self.locks.lock().unwrap().insert((guild_id.0, date.to_string()))
        }

        async fn release_build_lock(&self, guild_id: GuildId, date: NaiveDate) {
            self.locks.lock().unwrap().remove(&(guild_id.0, date.to_string()));
        }
    }

    struct CountingProvider {
        reply: String,
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl LlmProvider for CountingProvider {
        fn name(&self) -> &str {
            "counting"
        }
        async fn send(&self, _req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ChatResponse {
                content: self.reply.clone(),
                model: "m".into(),
                tokens_in: 1,
                tokens_out: 1,
            })
        }
        fn supports_native_schema(&self) -> bool {
            true
        }
    }

    fn harness(
        daily_reply: &str,
        merge_reply: &str,
    ) -> (Arc<MemoryManager>, Arc<FakeStore>, Arc<FakeCache>, Arc<AtomicU32>, Arc<AtomicU32>) {
        let store = Arc::new(FakeStore::default());
        let cache = Arc::new(FakeCache::default());
        let daily_calls = Arc::new(AtomicU32::new(0));
        let merge_calls = Arc::new(AtomicU32::new(0));
        let daily_provider = Arc::new(CountingProvider {
            reply: daily_reply.to_string(),
            calls: daily_calls.clone(),
        });
        let merge_provider = Arc::new(CountingProvider {
            reply: merge_reply.to_string(),
            calls: merge_calls.clone(),
        });
        let formatter = Arc::new(ConversationFormatter::new(Arc::new(FakeDirectory)));
        let _adapter: Arc<dyn ChatAdapter> = Arc::new(NoopAdapter);

        let manager = MemoryManager::new(
            store.clone(),
            cache.clone(),
            daily_provider,
            "daily-model",
            merge_provider,
            "merge-model",
            formatter,
            Arc::new(FakeDirectory),
        );
        (manager, store, cache, daily_calls, merge_calls)
    }

    #[tokio::test]
    async fn no_facts_no_summaries_is_null() {
        let (manager, _, _, _, merge_calls) = harness("{}", "{}");
        let out = manager.get_memories(GuildId(1), &[UserId(1)]).await;
        assert_eq!(out.get(&UserId(1)).unwrap(), &None);
        assert_eq!(merge_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn only_facts_returned_verbatim_without_merge_call() {
        let (manager, store, _, _, merge_calls) = harness("{}", "{}");
        store.set_user_facts(GuildId(1), UserId(1), "loves chess").await.unwrap();

        let out = manager.get_memories(GuildId(1), &[UserId(1)]).await;
        assert_eq!(out.get(&UserId(1)).unwrap().as_deref(), Some("loves chess"));
        assert_eq!(merge_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn single_historical_summary_returned_verbatim() {
        let (manager, store, _, _, merge_calls) = harness("{}", "{}");
        let yesterday = Utc::now().date_naive() - ChronoDuration::days(1);
        let mut summaries = DailySummaryMap::new();
        summaries.insert(UserId(1), "had a quiet day".to_string());
        store.save_daily_summaries(GuildId(1), yesterday, &summaries).await.unwrap();

        let out = manager.get_memories(GuildId(1), &[UserId(1)]).await;
        assert_eq!(out.get(&UserId(1)).unwrap().as_deref(), Some("had a quiet day"));
        assert_eq!(merge_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn facts_and_summary_trigger_merge_and_cache_the_result() {
        let (manager, store, _, _, merge_calls) = harness("{}", r#"{"context":"merged narrative"}"#);
        store.set_user_facts(GuildId(1), UserId(1), "loves chess").await.unwrap();
        let yesterday = Utc::now().date_naive() - ChronoDuration::days(1);
        let mut summaries = DailySummaryMap::new();
        summaries.insert(UserId(1), "played chess all day".to_string());
        store.save_daily_summaries(GuildId(1), yesterday, &summaries).await.unwrap();

        let out = manager.get_memories(GuildId(1), &[UserId(1)]).await;
        assert_eq!(out.get(&UserId(1)).unwrap().as_deref(), Some("merged narrative"));
        assert_eq!(merge_calls.load(Ordering::SeqCst), 1);

        // Second call with identical inputs hits the content-addressed cache.
        let out2 = manager.get_memories(GuildId(1), &[UserId(1)]).await;
        assert_eq!(out2.get(&UserId(1)).unwrap().as_deref(), Some("merged narrative"));
        assert_eq!(merge_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cold_today_cache_returns_empty_and_schedules_rebuild() {
        let (manager, store, cache, daily_calls, _) = harness(r#"{"summaries":[]}"#, "{}");
        let today = Utc::now().date_naive();
        store
            .add_chat_message(
                GuildId(1),
                &IngestedMessage {
                    message_id: 1,
                    author_id: UserId(1),
                    content: "hello".into(),
                    created_at: Utc::now(),
                    reply_to_id: None,
                },
            )
            .await
            .unwrap();

        let out = manager.get_memories(GuildId(1), &[UserId(1)]).await;
        assert_eq!(out.get(&UserId(1)).unwrap(), &None);

        tokio::time::sleep(StdDuration::from_millis(50)).await;
        assert!(cache.get_daily_summary(GuildId(1), today).await.is_some());
        assert_eq!(daily_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_rebuild_attempts_only_one_winner() {
        let (manager, _, cache, _, _) = harness(r#"{"summaries":[]}"#, "{}");
        let today = Utc::now().date_naive();

        let first = cache.try_acquire_build_lock(GuildId(1), today).await;
        let second = cache.try_acquire_build_lock(GuildId(1), today).await;
        assert!(first);
        assert!(!second);

        manager.schedule_rebuild(GuildId(1), today);
        tokio::time::sleep(StdDuration::from_millis(20)).await;
        // The outstanding lock from this test should have blocked the
        // manager's own rebuild attempt.
        assert!(cache.get_daily_summary(GuildId(1), today).await.is_none());
    }
}
