//! Dependency wiring for one CLI invocation, grounded on
//! `container.py::Container.__init__`'s construction order: concrete
//! clients first, retry wrappers around the rate-limited ones, composite
//! fallback chains built from those, then the components that consume
//! them. Far fewer provider slots than the original (`parley.toml` names
//! five backends, not a dozen), so the composite chains below approximate
//! the original's intent rather than reproduce its exact membership — see
//! `DESIGN.md`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;

use parley_core::config::ParleyConfig;
use parley_core::ids::{GuildId, MessageId, UserId};
use parley_graph::{ChatAdapter, ConversationFormatter, GraphError, Message, UserDirectory};
use parley_memory::{DistributedCache, DurableStore, MemoryManager, RedisCache, SqliteStore};
use parley_providers::{
    AnthropicProvider, LlmProvider, OpenAiCompatProvider, RetryBound, RetryProvider,
};
use parley_router::{
    is_notsure_response, pin_and_compose, pin_and_compose_provider, AiBackend, BackendSlot,
    GeneratorDispatch, LanguageDetector, ResponsePostProcessor, Router, UserResolver,
};

/// Chat adapter for the single-turn CLI driver: the trigger message is the
/// only message that exists, so there is no history to walk. `send_reply`
/// prints to stdout rather than calling back into a real gateway — the
/// actual gateway is out of scope per the reasoning core's own non-goals.
pub struct StandaloneAdapter;

#[async_trait]
impl ChatAdapter for StandaloneAdapter {
    async fn fetch_message(&self, _guild_id: GuildId, _id: MessageId) -> Result<Option<Message>, GraphError> {
        Ok(None)
    }

    async fn fetch_history(
        &self,
        _guild_id: GuildId,
        _before_id: MessageId,
        _limit: usize,
    ) -> Result<Vec<Message>, GraphError> {
        Ok(Vec::new())
    }

    async fn send_reply(&self, _guild_id: GuildId, in_reply_to: MessageId, content: &str) -> Result<MessageId, GraphError> {
        println!("{content}");
        Ok(in_reply_to)
    }

    async fn delete_message(&self, _guild_id: GuildId, _id: MessageId) -> Result<(), GraphError> {
        Ok(())
    }

    async fn add_reaction(&self, _guild_id: GuildId, _id: MessageId, _emoji: &str) -> Result<(), GraphError> {
        Ok(())
    }
}

/// Displays every user as `User(ID:n)` — the same fallback string
/// `user_resolver.py::get_display_name` uses when it has no bot client to
/// ask, which is always true here.
pub struct StandaloneDirectory;

#[async_trait]
impl UserDirectory for StandaloneDirectory {
    async fn display_name(&self, _guild_id: GuildId, user_id: UserId) -> Option<String> {
        Some(format!("User(ID:{user_id})"))
    }
}

/// Resolves Discord-style mentions (`<@123>`, `<@!123>`) and bare numeric
/// ids to a `UserId`. Grounded on `user_resolver.py::resolve_user_id`'s
/// mention-regex-then-digit path; its name/nickname search falls back to a
/// live guild member cache this standalone driver has no access to, so
/// that branch has nothing to port.
pub struct RegexUserResolver {
    mention: Regex,
}

impl Default for RegexUserResolver {
    fn default() -> Self {
        Self {
            mention: Regex::new(r"^<@!?(\d+)>$").expect("static mention pattern is valid"),
        }
    }
}

#[async_trait]
impl UserResolver for RegexUserResolver {
    async fn resolve_user_id(&self, _guild_id: GuildId, mention: &str) -> Option<UserId> {
        if let Some(caps) = self.mention.captures(mention) {
            return caps[1].parse::<u64>().ok().map(UserId);
        }
        mention.trim().parse::<u64>().ok().map(UserId)
    }
}

/// Everything one pipeline turn needs, wired from config.
pub struct Container {
    pub router: Router,
    pub dispatch: GeneratorDispatch,
}

impl Container {
    pub async fn new(config: &ParleyConfig) -> anyhow::Result<Self> {
        let providers = &config.providers;

        let anthropic_cfg = providers
            .anthropic
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("providers.anthropic is required"))?;
        let claude: Arc<dyn LlmProvider> = Arc::new(AnthropicProvider::new(
            anthropic_cfg.api_key.clone(),
            anthropic_cfg.base_url.clone(),
        ));

        let gemini_flash_cfg = providers
            .gemini_flash
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("providers.gemini_flash is required"))?;
        let gemini_flash: Arc<dyn LlmProvider> = Arc::new(OpenAiCompatProvider::for_known_backend(
            "gemini_flash",
            gemini_flash_cfg.api_key.clone(),
            gemini_flash_cfg.base_url.clone(),
        )?);

        let codex_cfg = providers
            .codex
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("providers.codex is required"))?;
        let codex: Arc<dyn LlmProvider> = Arc::new(OpenAiCompatProvider::for_known_backend(
            "codex",
            codex_cfg.api_key.clone(),
            codex_cfg.base_url.clone(),
        )?);

        // Grok and Gemma are the rate-limited backends, matching
        // container.py's "Apply retry policy for rate-limited services
        // (Gemma/Grok only)" — everything else is retried by the caller's
        // own composite fallback instead.
        let grok_cfg = providers
            .grok
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("providers.grok is required"))?;
        let grok_raw = OpenAiCompatProvider::for_known_backend(
            "grok",
            grok_cfg.api_key.clone(),
            grok_cfg.base_url.clone(),
        )?;
        let retrying_grok: Arc<dyn LlmProvider> =
            Arc::new(RetryProvider::new(Box::new(grok_raw), RetryBound::MaxTries(3)));

        let gemma_cfg = providers
            .gemma
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("providers.gemma is required"))?;
        let gemma_raw = OpenAiCompatProvider::for_known_backend(
            "gemma",
            gemma_cfg.api_key.clone(),
            gemma_cfg.base_url.clone(),
        )?;
        let retrying_gemma: Arc<dyn LlmProvider> = Arc::new(RetryProvider::new(
            Box::new(gemma_raw),
            RetryBound::MaxTime(std::time::Duration::from_secs(60)),
        ));

        let slot = |provider: &Arc<dyn LlmProvider>, model: &str| BackendSlot {
            provider: Arc::clone(provider),
            model: model.to_string(),
        };

        // Language detection: gemma first (cheap), grok as fallback —
        // adapts container.py's gemma_with_kimi_fallback without an
        // Ollama-equivalent slot to fall back to.
        let language_provider = pin_and_compose(vec![
            slot(&retrying_gemma, &gemma_cfg.model),
            slot(&retrying_grok, &grok_cfg.model),
        ]);
        let language_detector = Arc::new(LanguageDetector::new(language_provider, "unused"));

        // Response post-processing: same two cheap backends, matching
        // response_summarizer.py's dedicated (non-generation) client.
        let summarizer_provider = pin_and_compose(vec![
            slot(&retrying_gemma, &gemma_cfg.model),
            slot(&codex, &codex_cfg.model),
        ]);
        let postprocessor = Arc::new(ResponsePostProcessor::new(summarizer_provider, "unused"));

        // Router's own classification chain: cheap-first, escalating to
        // Claude on a NOTSURE verdict, mirroring container.py's
        // `router_client = CompositeAIClient([ollama_kimi, retrying_gemma,
        // retrying_grok], is_bad_response=...)`.
        let router_provider = Arc::new(
            pin_and_compose_provider(vec![
                slot(&retrying_gemma, &gemma_cfg.model),
                slot(&retrying_grok, &grok_cfg.model),
                slot(&claude, &anthropic_cfg.model),
            ])
            .with_bad_response_predicate(is_notsure_response),
        );
        let router = Router::new(router_provider, "unused", Arc::clone(&language_detector));

        // FACT route: three-member fallback chain, matching container.py's
        // fixed fact_handler_client composite in spirit (local/cheap
        // models first, one rate-limited backend as the last resort).
        let fact_backends = vec![
            slot(&retrying_gemma, &gemma_cfg.model),
            slot(&codex, &codex_cfg.model),
            slot(&retrying_grok, &grok_cfg.model),
        ];

        let mut general_backends = HashMap::new();
        general_backends.insert(AiBackend::GeminiFlash, slot(&gemini_flash, &gemini_flash_cfg.model));
        general_backends.insert(AiBackend::Claude, slot(&claude, &anthropic_cfg.model));
        general_backends.insert(AiBackend::Grok, slot(&retrying_grok, &grok_cfg.model));
        general_backends.insert(AiBackend::Gemma, slot(&retrying_gemma, &gemma_cfg.model));
        general_backends.insert(AiBackend::Codex, slot(&codex, &codex_cfg.model));
        let general_fallback_order = vec![AiBackend::GeminiFlash, AiBackend::Claude, AiBackend::Grok];

        let directory: Arc<dyn UserDirectory> = Arc::new(StandaloneDirectory);
        let formatter = Arc::new(ConversationFormatter::new(Arc::clone(&directory)));
        let adapter: Arc<dyn ChatAdapter> = Arc::new(StandaloneAdapter);

        let store: Arc<dyn DurableStore> = Arc::new(SqliteStore::open(&config.memory.sqlite_path)?);
        let cache: Arc<dyn DistributedCache> = Arc::new(RedisCache::connect(&config.memory.redis_url).await?);

        // Daily-summary generation and the cross-day merge both lean on
        // Gemini in the original (`gemini_client`/`gemma_client` passed
        // into `MemoryManager`); this slate only has one Gemini-family
        // slot, so both roles share it.
        let memory_manager = MemoryManager::new(
            store.clone(),
            cache,
            Arc::clone(&gemini_flash),
            gemini_flash_cfg.model.clone(),
            retrying_gemma.clone(),
            gemma_cfg.model.clone(),
            Arc::clone(&formatter),
            Arc::clone(&directory),
        );

        let user_resolver: Arc<dyn UserResolver> = Arc::new(RegexUserResolver::default());
        let famous_backend = slot(&retrying_grok, &grok_cfg.model);

        let dispatch = GeneratorDispatch::new(
            adapter,
            formatter,
            directory,
            memory_manager,
            store,
            user_resolver,
            postprocessor,
            famous_backend,
            fact_backends,
            general_backends,
            general_fallback_order,
        );

        Ok(Self { router, dispatch })
    }
}
