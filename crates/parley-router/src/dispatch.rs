//! Generator dispatch (C8): turns a routed request into a final reply by
//! fetching the relevant conversation window and memories, building a
//! route-specific prompt, calling the right provider chain, and running the
//! result through post-processing.
//!
//! `Route::None`/`Route::NotSure` never reach here — `NotSure` is an
//! internal routing signal the provider chain escalates away from (see
//! `router::is_notsure_response`), and `None` owes no reply. Reaction-
//! triggered generation (wisdom, devil's advocate) lives outside this
//! dispatch table entirely: the original system drives those from a
//! separate reaction-add entry point, not from message routing, so only
//! their structured-output shapes are declared in `route.rs`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use parley_core::ids::{GuildId, UserId};
use parley_graph::{ChatAdapter, ConversationFormatter, ConversationMessage, Message};
use parley_graph::graph::{CachedHistoryFetcher, ConversationGraphBuilder};
use parley_memory::{DurableStore, MemoryManager};
use parley_providers::{structured, ChatRequest, ChatResponse, CompositeProvider, LlmProvider, ProviderError};

use crate::error::{Result, RouterError};
use crate::postprocess::ResponsePostProcessor;
use crate::route::{
    memory_forget_schema, memory_update_schema, AiBackend, FactOperation, FactParams, FamousParams,
    GeneralParams, MemoryForgetResponse, MemoryUpdateResponse, RouteParameters,
};

/// The user id reserved for embedded articles/link previews — never a real
/// conversation participant, dropped before memory lookup or mention
/// rendering. Grounded on `general_query_generator.py::_extract_unique_user_ids`
/// discarding id `0`.
pub const SENTINEL_ARTICLE_USER_ID: UserId = UserId(0);

const DISCORD_REPLY_LIMIT: usize = 2000;

/// Resolves a free-form mention ("a Discord mention, a raw id, or a
/// recognizable nickname") to a concrete user id for the FACT route.
/// Grounded on `user_resolver.py::UserResolver.resolve_user_id`.
#[async_trait]
pub trait UserResolver: Send + Sync {
    async fn resolve_user_id(&self, guild_id: GuildId, mention: &str) -> Option<UserId>;
}

#[derive(Debug, Clone, Copy)]
pub struct ConversationWindow {
    pub min_linear: usize,
    pub max_total: usize,
    pub time_threshold_minutes: i64,
}

impl Default for ConversationWindow {
    fn default() -> Self {
        Self {
            min_linear: 10,
            max_total: 30,
            time_threshold_minutes: 30,
        }
    }
}

/// A single named backend available to the GENERAL route, together with
/// the model string it should be pinned to.
#[derive(Clone)]
pub struct BackendSlot {
    pub provider: Arc<dyn LlmProvider>,
    pub model: String,
}

/// Wraps a shared provider and forces every outgoing request onto one
/// model, regardless of what the caller set. Needed because `ChatRequest`
/// carries a single `model` field that flows unmodified through a
/// `CompositeProvider` chain — without this, every member of a
/// multi-backend GENERAL chain would be asked to serve whichever model the
/// first member happened to use.
struct ModelPinnedProvider {
    inner: Arc<dyn LlmProvider>,
    model: String,
}

#[async_trait]
impl LlmProvider for ModelPinnedProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn send(&self, req: &ChatRequest) -> std::result::Result<ChatResponse, ProviderError> {
        let mut pinned = req.clone();
        pinned.model = self.model.clone();
        self.inner.send(&pinned).await
    }

    fn supports_native_schema(&self) -> bool {
        self.inner.supports_native_schema()
    }

    fn supports_grounding(&self) -> bool {
        self.inner.supports_grounding()
    }

    fn supports_images(&self) -> bool {
        self.inner.supports_images()
    }
}

/// Pins each slot to its own model and composes the result, in order. The
/// caller still gets a bare `CompositeProvider` back so it can attach
/// `.shuffled()`/`.with_bad_response_predicate(...)` before wrapping it —
/// `parley-app`'s container uses this directly to build the router's own
/// provider chain the same way the FACT/GENERAL chains are built here.
pub fn pin_and_compose_provider(slots: Vec<BackendSlot>) -> CompositeProvider {
    let members: Vec<Box<dyn LlmProvider>> = slots
        .into_iter()
        .map(|slot| {
            Box::new(ModelPinnedProvider {
                inner: slot.provider,
                model: slot.model,
            }) as Box<dyn LlmProvider>
        })
        .collect();
    CompositeProvider::new(members)
}

pub fn pin_and_compose(slots: Vec<BackendSlot>) -> Arc<dyn LlmProvider> {
    Arc::new(pin_and_compose_provider(slots))
}

fn render_message_xml(guild_id: GuildId, formatted_conversation: &str) -> &str {
    // The formatter already emits a complete <conversation_history> block;
    // callers just splice it into their own <system_instructions> prompt.
    let _ = guild_id;
    formatted_conversation
}

fn remember_prompt(current_memory: Option<&str>, fact_content: &str, language_name: &str) -> String {
    match current_memory {
        None => format!(
            "Create an initial third-person memory entry for this user incorporating the new fact below, \
             then write a short, friendly confirmation naming the fact. Respond in {language_name}.\n\n\
             New fact: {fact_content}"
        ),
        Some(existing) => format!(
            "Update this user's memory by merging in the new fact below, resolving conflicts in favor of \
             the new information while keeping a natural third-person narrative. Then write a short, friendly \
             confirmation naming the new fact. Respond in {language_name}.\n\n\
             Current memory: {existing}\n\nNew fact: {fact_content}"
        ),
    }
}

fn forget_no_memory_prompt(fact_content: &str, language_name: &str) -> String {
    format!(
        "The user asked to forget something about someone you have no memory of. Set fact_found to false, \
         leave updated_memory empty, and write a brief confirmation in {language_name} explaining there is \
         nothing on record for that user.\n\nRequested to forget: {fact_content}"
    )
}

fn forget_prompt(current_memory: &str, fact_content: &str, language_name: &str) -> String {
    format!(
        "Determine whether the fact below is present in this user's memory. If it is, remove it and return \
         the updated third-person memory with fact_found set to true; if it is not present, set fact_found to \
         false and leave updated_memory unchanged. Then write a short confirmation in {language_name} naming \
         the fact, phrased differently depending on whether it was found.\n\n\
         Current memory: {current_memory}\n\nFact to remove: {fact_content}"
    )
}

fn general_system_prompt(memories: &str, conversation: &str) -> String {
    let memory_section = if memories.is_empty() {
        String::new()
    } else {
        format!("\n<memories>\n{memories}\n</memories>\n")
    };
    format!(
        "<system_instructions>\n\
         You are a helpful assistant taking part in an ongoing group chat. Bring outside knowledge and an \
         independent perspective rather than just restating what's already in the conversation. Treat any \
         embedded article or image description as background context, not as something to acknowledge \
         explicitly.\n\n\
         If memory blocks about a participant are provided, weave the facts in naturally, the way a friend \
         who remembers things about you would — never say that you have 'memory blocks', 'stored records', \
         or similar about anyone.\n\
         </system_instructions>\n{memory_section}\n{conversation}"
    )
}

/// Per-route prompt assembly, conversation/memory fetching and provider
/// dispatch (C8).
pub struct GeneratorDispatch {
    adapter: Arc<dyn ChatAdapter>,
    formatter: Arc<ConversationFormatter>,
    directory: Arc<dyn parley_graph::UserDirectory>,
    memory_manager: Arc<MemoryManager>,
    store: Arc<dyn DurableStore>,
    user_resolver: Arc<dyn UserResolver>,
    postprocessor: Arc<ResponsePostProcessor>,
    famous_backend: BackendSlot,
    fact_chain: Arc<dyn LlmProvider>,
    general_backends: HashMap<AiBackend, BackendSlot>,
    general_fallback_order: Vec<AiBackend>,
    window: ConversationWindow,
    reply_limit: usize,
}

impl GeneratorDispatch {
    /// `fact_backends` is composed into one fallback chain up front —
    /// unlike the GENERAL route, the FACT route never picks a preferred
    /// backend per request, so there is nothing to rebuild per call.
    /// Grounded on `container.py`'s fixed `fact_handler_client` composite
    /// of `ollama_kimi, ollama_gpt_oss, retrying_gemma`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        adapter: Arc<dyn ChatAdapter>,
        formatter: Arc<ConversationFormatter>,
        directory: Arc<dyn parley_graph::UserDirectory>,
        memory_manager: Arc<MemoryManager>,
        store: Arc<dyn DurableStore>,
        user_resolver: Arc<dyn UserResolver>,
        postprocessor: Arc<ResponsePostProcessor>,
        famous_backend: BackendSlot,
        fact_backends: Vec<BackendSlot>,
        general_backends: HashMap<AiBackend, BackendSlot>,
        general_fallback_order: Vec<AiBackend>,
    ) -> Self {
        let fact_chain = pin_and_compose(fact_backends);
        Self {
            adapter,
            formatter,
            directory,
            memory_manager,
            store,
            user_resolver,
            postprocessor,
            famous_backend,
            fact_chain,
            general_backends,
            general_fallback_order,
            window: ConversationWindow::default(),
            reply_limit: DISCORD_REPLY_LIMIT,
        }
    }

    pub fn with_window(mut self, window: ConversationWindow) -> Self {
        self.window = window;
        self
    }

    async fn fetch_conversation(&self, guild_id: GuildId, trigger: Message) -> Vec<ConversationMessage> {
        let fetcher = Arc::new(CachedHistoryFetcher::new(Arc::clone(&self.adapter), guild_id));
        let builder = ConversationGraphBuilder::new(fetcher);
        builder
            .build_conversation_graph(
                trigger,
                self.window.min_linear,
                self.window.max_total,
                self.window.time_threshold_minutes,
            )
            .await
    }

    fn extract_participants(conversation: &[ConversationMessage]) -> Vec<UserId> {
        let mut seen = std::collections::HashSet::new();
        let mut ids = Vec::new();
        for m in conversation {
            for id in std::iter::once(m.author_id).chain(m.mentioned_user_ids.iter().copied()) {
                if id != SENTINEL_ARTICLE_USER_ID && seen.insert(id) {
                    ids.push(id);
                }
            }
        }
        ids
    }

    async fn render_memories(&self, guild_id: GuildId, participants: &[UserId]) -> String {
        if participants.is_empty() {
            return String::new();
        }
        let memories = self.memory_manager.get_memories(guild_id, participants).await;
        let mut blocks = Vec::new();
        for user_id in participants {
            if let Some(Some(facts)) = memories.get(user_id) {
                let name = self
                    .directory
                    .display_name(guild_id, *user_id)
                    .await
                    .unwrap_or_else(|| format!("user-{user_id}"));
                blocks.push(format!("<memory>\n<name>{name}</name>\n<facts>{facts}</facts>\n</memory>"));
            }
        }
        blocks.join("\n")
    }

    /// Dispatches a routed request's parameters to the matching generator
    /// and returns the final, post-processed reply (`None` when no reply
    /// is owed, matching the GENERAL route's "model declined to answer"
    /// case).
    pub async fn dispatch(
        &self,
        guild_id: GuildId,
        trigger: Message,
        parameters: &RouteParameters,
    ) -> Result<Option<String>> {
        match parameters {
            RouteParameters::None => Ok(None),
            RouteParameters::Famous(params) => self.dispatch_famous(guild_id, trigger, params).await.map(Some),
            RouteParameters::General(params) => self.dispatch_general(guild_id, trigger, params).await,
            RouteParameters::Fact(params) => self.dispatch_fact(guild_id, params).await.map(Some),
        }
    }

    async fn dispatch_famous(&self, guild_id: GuildId, trigger: Message, params: &FamousParams) -> Result<String> {
        let conversation = self.fetch_conversation(guild_id, trigger.clone()).await;
        let formatted = self.formatter.format(guild_id, &conversation).await;
        let language_name = params.language.language_name.as_deref().unwrap_or("English");

        let system_prompt = format!(
            "<system_instructions>\nYou are role-playing as {person}. Answer the latest message in the \
             conversation the way {person} would, staying fully in character. Keep the reply under {limit} \
             characters. Respond in {language_name}.\n</system_instructions>\n{conversation}",
            person = params.famous_person,
            limit = self.reply_limit,
            conversation = render_message_xml(guild_id, &formatted),
        );

        let req = ChatRequest::new(&self.famous_backend.model, system_prompt)
            .with_user_message(&trigger.content);
        let resp = self.famous_backend.provider.send(&req).await?;
        let wrapped = format!("**{} would say:**\n\n{}", params.famous_person, resp.content);
        Ok(self.postprocessor.process_response(&wrapped, self.reply_limit).await)
    }

    fn backend_for(&self, backend: AiBackend) -> Result<&BackendSlot> {
        self.general_backends
            .get(&backend)
            .ok_or_else(|| RouterError::UnknownBackend(backend.as_str().to_string()))
    }

    /// Builds the preferred-backend-first fallback chain for one GENERAL
    /// request, each member pinned to its own model. Grounded on
    /// `container.py::Container._build_general_ai_client`: the preferred
    /// backend leads, followed by the rest of the fixed fallback order
    /// (which never includes `gemma` — that backend is only ever reached
    /// when explicitly requested as the preferred one).
    fn build_general_chain(&self, preferred: AiBackend) -> Result<CompositeProvider> {
        let mut order = vec![preferred];
        order.extend(self.general_fallback_order.iter().copied().filter(|b| *b != preferred));

        let mut slots = Vec::with_capacity(order.len());
        for backend in order {
            slots.push(self.backend_for(backend)?.clone());
        }
        Ok(pin_and_compose_provider(slots))
    }

    async fn dispatch_general(&self, guild_id: GuildId, trigger: Message, params: &GeneralParams) -> Result<Option<String>> {
        // Only ask for grounding when the router-selected backend can
        // actually honor it — asking a chain whose lead member rejects
        // `enable_grounding` would just bounce straight past the backend the
        // router picked and land on whichever fallback tolerates the flag,
        // silently overriding the selection.
        let wants_grounding = self.backend_for(params.ai_backend)?.provider.supports_grounding();
        let chain = self.build_general_chain(params.ai_backend)?;

        let conversation = self.fetch_conversation(guild_id, trigger).await;
        let participants = Self::extract_participants(&conversation);
        let memories = self.render_memories(guild_id, &participants).await;
        let formatted = self.formatter.format(guild_id, &conversation).await;

        let system_prompt = general_system_prompt(&memories, render_message_xml(guild_id, &formatted));
        let mut req = ChatRequest::new("", system_prompt).with_user_message(&params.cleaned_query);
        req.temperature = params.temperature;
        req.enable_grounding = wants_grounding;

        let resp = chain.send(&req).await?;
        if resp.content.trim().is_empty() {
            warn!(guild_id = %guild_id, "general route produced an empty reply, sending nothing");
            return Ok(None);
        }
        Ok(Some(self.postprocessor.process_response(&resp.content, self.reply_limit).await))
    }

    async fn dispatch_fact(&self, guild_id: GuildId, params: &FactParams) -> Result<String> {
        let Some(user_id) = self.user_resolver.resolve_user_id(guild_id, &params.user_mention).await else {
            return Ok(format!(
                "I couldn't identify the user '{}'. Please use a standard mention, user ID, or a recognizable nickname.",
                params.user_mention
            ));
        };

        let language_name = params.language.language_name.as_deref().unwrap_or("English");
        match params.operation {
            FactOperation::Remember => self.remember_fact(guild_id, user_id, &params.fact_content, language_name).await,
            FactOperation::Forget => self.forget_fact(guild_id, user_id, &params.fact_content, language_name).await,
        }
    }

    async fn remember_fact(&self, guild_id: GuildId, user_id: UserId, fact_content: &str, language_name: &str) -> Result<String> {
        let current = self.store.get_user_facts(guild_id, user_id).await?;
        let prompt = remember_prompt(current.as_deref(), fact_content, language_name);

        // The model actually used comes from whichever chain member answers
        // (each pinned to its own model) — this field is overwritten per
        // member and never reaches a provider unmodified.
        let mut req = ChatRequest::new("fact", prompt).with_user_message(fact_content);
        req.temperature = 0.0;
        req.response_schema = Some(memory_update_schema());

        let result: MemoryUpdateResponse = structured::generate(self.fact_chain.as_ref(), req).await?;
        self.store.set_user_facts(guild_id, user_id, &result.updated_memory).await?;
        info!(guild_id = %guild_id, user_id = %user_id, "remembered a fact");
        Ok(result.confirmation_message)
    }

    async fn forget_fact(&self, guild_id: GuildId, user_id: UserId, fact_content: &str, language_name: &str) -> Result<String> {
        let current = self.store.get_user_facts(guild_id, user_id).await?;

        let Some(current) = current else {
            let prompt = forget_no_memory_prompt(fact_content, language_name);
            let mut req = ChatRequest::new("fact", prompt).with_user_message(fact_content);
            req.temperature = 0.0;
            req.response_schema = Some(memory_forget_schema());
            let result: MemoryForgetResponse = structured::generate(self.fact_chain.as_ref(), req).await?;
            return Ok(result.confirmation_message);
        };

        let prompt = forget_prompt(&current, fact_content, language_name);
        let mut req = ChatRequest::new("fact", prompt).with_user_message(fact_content);
        req.temperature = 0.0;
        req.response_schema = Some(memory_forget_schema());

        let result: MemoryForgetResponse = structured::generate(self.fact_chain.as_ref(), req).await?;
        if result.fact_found {
            self.store.set_user_facts(guild_id, user_id, &result.updated_memory).await?;
            info!(guild_id = %guild_id, user_id = %user_id, "forgot a fact");
        }
        Ok(result.confirmation_message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::LanguageTag;
    use async_trait::async_trait;
    use chrono::Utc;
    use parley_core::ids::MessageId;
    use parley_graph::UserDirectory;
    use parley_memory::{CachedDailySummary, DailySummaryMap, DistributedCache, IngestedMessage};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex as StdMutex;

    struct EmptyAdapter;
    #[async_trait]
    impl ChatAdapter for EmptyAdapter {
        async fn fetch_message(&self, _g: GuildId, _id: MessageId) -> std::result::Result<Option<Message>, parley_graph::GraphError> {
            Ok(None)
        }
        async fn fetch_history(&self, _g: GuildId, _before: MessageId, _limit: usize) -> std::result::Result<Vec<Message>, parley_graph::GraphError> {
            Ok(vec![])
        }
        async fn send_reply(&self, _g: GuildId, _r: MessageId, _c: &str) -> std::result::Result<MessageId, parley_graph::GraphError> {
            unimplemented!()
        }
        async fn delete_message(&self, _g: GuildId, _id: MessageId) -> std::result::Result<(), parley_graph::GraphError> {
            unimplemented!()
        }
        async fn add_reaction(&self, _g: GuildId, _id: MessageId, _e: &str) -> std::result::Result<(), parley_graph::GraphError> {
            unimplemented!()
        }
    }

    struct NamedDirectory;
    #[async_trait]
    impl UserDirectory for NamedDirectory {
        async fn display_name(&self, _g: GuildId, user_id: UserId) -> Option<String> {
            Some(format!("user-{user_id}"))
        }
    }

    #[derive(Default)]
    struct FakeStore {
        facts: StdMutex<HashMap<(u64, u64), String>>,
    }
    #[async_trait]
    impl DurableStore for FakeStore {
        async fn get_user_facts(&self, guild_id: GuildId, user_id: UserId) -> std::result::Result<Option<String>, parley_memory::MemoryError> {
            Ok(self.facts.lock().unwrap().get(&(guild_id.0, user_id.0)).cloned())
        }
        async fn set_user_facts(&self, guild_id: GuildId, user_id: UserId, facts: &str) -> std::result::Result<(), parley_memory::MemoryError> {
            self.facts.lock().unwrap().insert((guild_id.0, user_id.0), facts.to_string());
            Ok(())
        }
        async fn has_chat_messages_for_date(&self, _g: GuildId, _d: chrono::NaiveDate) -> std::result::Result<bool, parley_memory::MemoryError> {
            Ok(false)
        }
        async fn get_chat_messages_for_date(&self, _g: GuildId, _d: chrono::NaiveDate) -> std::result::Result<Vec<IngestedMessage>, parley_memory::MemoryError> {
            Ok(vec![])
        }
        async fn add_chat_message(&self, _g: GuildId, _m: &IngestedMessage) -> std::result::Result<(), parley_memory::MemoryError> {
            Ok(())
        }
        async fn get_daily_summaries(&self, _g: GuildId, _d: chrono::NaiveDate) -> std::result::Result<Option<DailySummaryMap>, parley_memory::MemoryError> {
            Ok(None)
        }
        async fn save_daily_summaries(&self, _g: GuildId, _d: chrono::NaiveDate, _s: &DailySummaryMap) -> std::result::Result<(), parley_memory::MemoryError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct NoopCache;
    #[async_trait]
    impl DistributedCache for NoopCache {
        async fn get_daily_summary(&self, _g: GuildId, _d: chrono::NaiveDate) -> Option<CachedDailySummary> {
            None
        }
        async fn set_daily_summary(&self, _g: GuildId, _d: chrono::NaiveDate, _e: &CachedDailySummary) {}
        async fn try_acquire_build_lock(&self, _g: GuildId, _d: chrono::NaiveDate) -> bool {
            true
        }
        async fn release_build_lock(&self, _g: GuildId, _d: chrono::NaiveDate) {}
    }

    struct ScriptedProvider {
        content: String,
        calls: Arc<AtomicU32>,
    }
    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }
        async fn send(&self, _req: &ChatRequest) -> std::result::Result<ChatResponse, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ChatResponse {
                content: self.content.clone(),
                model: "m".into(),
                tokens_in: 1,
                tokens_out: 1,
            })
        }
        fn supports_native_schema(&self) -> bool {
            true
        }
    }

    struct AlwaysResolves(UserId);
    #[async_trait]
    impl UserResolver for AlwaysResolves {
        async fn resolve_user_id(&self, _g: GuildId, _m: &str) -> Option<UserId> {
            Some(self.0)
        }
    }

    struct NeverResolves;
    #[async_trait]
    impl UserResolver for NeverResolves {
        async fn resolve_user_id(&self, _g: GuildId, _m: &str) -> Option<UserId> {
            None
        }
    }

    fn dispatch_with(
        fact_reply: &str,
        resolver: Arc<dyn UserResolver>,
    ) -> (GeneratorDispatch, Arc<FakeStore>) {
        let store = Arc::new(FakeStore::default());
        let cache = Arc::new(NoopCache::default());
        let directory: Arc<dyn UserDirectory> = Arc::new(NamedDirectory);
        let formatter = Arc::new(ConversationFormatter::new(Arc::clone(&directory)));
        let dummy_provider: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider {
            content: "{}".into(),
            calls: Arc::new(AtomicU32::new(0)),
        });
        let memory_manager = MemoryManager::new(
            store.clone(),
            cache,
            dummy_provider.clone(),
            "daily-model",
            dummy_provider.clone(),
            "merge-model",
            formatter.clone(),
            directory.clone(),
        );
        let fact_provider: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider {
            content: fact_reply.to_string(),
            calls: Arc::new(AtomicU32::new(0)),
        });
        let postprocessor = Arc::new(ResponsePostProcessor::new(dummy_provider.clone(), "summarizer-model"));

        let dispatch = GeneratorDispatch::new(
            Arc::new(EmptyAdapter),
            formatter,
            directory,
            memory_manager,
            store.clone(),
            resolver,
            postprocessor,
            BackendSlot { provider: dummy_provider.clone(), model: "famous-model".into() },
            vec![BackendSlot { provider: fact_provider, model: "fact-model".into() }],
            HashMap::new(),
            vec![],
        );
        (dispatch, store)
    }

    fn fact_params(operation: FactOperation, mention: &str, content: &str) -> FactParams {
        FactParams {
            operation,
            user_mention: mention.to_string(),
            fact_content: content.to_string(),
            language: LanguageTag { language_code: Some("en".into()), language_name: Some("English".into()) },
        }
    }

    #[tokio::test]
    async fn unresolved_mention_returns_an_apology_without_touching_the_store() {
        let (dispatch, store) = dispatch_with("unused", Arc::new(NeverResolves));
        let params = fact_params(FactOperation::Remember, "nobody", "likes tea");
        let reply = dispatch.dispatch_fact(GuildId(1), &params).await.unwrap();
        assert!(reply.contains("nobody"));
        assert!(store.facts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn remember_persists_the_updated_memory() {
        let reply = r#"{"updated_memory":"likes tea","confirmation_message":"noted"}"#;
        let (dispatch, store) = dispatch_with(reply, Arc::new(AlwaysResolves(UserId(7))));
        let params = fact_params(FactOperation::Remember, "<@7>", "likes tea");
        let confirmation = dispatch.dispatch_fact(GuildId(1), &params).await.unwrap();
        assert_eq!(confirmation, "noted");
        assert_eq!(store.facts.lock().unwrap().get(&(1, 7)).unwrap(), "likes tea");
    }

    #[tokio::test]
    async fn forget_with_fact_not_found_leaves_memory_untouched() {
        let reply = r#"{"updated_memory":"","fact_found":false,"confirmation_message":"couldn't find that"}"#;
        let (dispatch, store) = dispatch_with(reply, Arc::new(AlwaysResolves(UserId(7))));
        store.facts.lock().unwrap().insert((1, 7), "likes tea".into());
        let params = fact_params(FactOperation::Forget, "<@7>", "hates coffee");
        let confirmation = dispatch.dispatch_fact(GuildId(1), &params).await.unwrap();
        assert_eq!(confirmation, "couldn't find that");
        assert_eq!(store.facts.lock().unwrap().get(&(1, 7)).unwrap(), "likes tea");
    }

    #[tokio::test]
    async fn participants_drop_the_article_sentinel_and_deduplicate() {
        let conversation = vec![
            ConversationMessage {
                message_id: MessageId(1),
                author_id: UserId(1),
                content: "hi".into(),
                timestamp: Utc::now().to_rfc3339(),
                mentioned_user_ids: vec![UserId(0), UserId(2)],
                reply_to_id: None,
            },
            ConversationMessage {
                message_id: MessageId(2),
                author_id: UserId(2),
                content: "hey".into(),
                timestamp: Utc::now().to_rfc3339(),
                mentioned_user_ids: vec![UserId(1)],
                reply_to_id: None,
            },
        ];
        let participants = GeneratorDispatch::extract_participants(&conversation);
        assert_eq!(participants, vec![UserId(1), UserId(2)]);
    }
}
