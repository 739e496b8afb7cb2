use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Duration;
use tracing::{debug, warn};

use parley_core::ids::{GuildId, MessageId, UserId};

use crate::adapter::ChatAdapter;
use crate::error::GraphError;
use crate::message::{ConversationMessage, Message};

/// Up to a hundred predecessors come back per bulk history call — the
/// coalesced fetch cache below is sized around that assumption.
const BULK_HISTORY_PAGE: usize = 100;

/// Mapping `id -> Message` plus the two derived sets the TIK/TOK walk
/// consumes. The graph never removes a node once added, never contains two
/// nodes with the same id, and strictly follows `reply_to_id`/channel order
/// — it cannot contain a cycle.
#[derive(Debug, Default)]
pub struct MessageGraph {
    nodes: HashMap<MessageId, Message>,
    unexplored_references: HashSet<MessageId>,
    temporal_frontier: HashSet<MessageId>,
}

impl MessageGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: MessageId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.nodes.get(&id)
    }

    /// Adds `message` if its id isn't already present. Returns whether it
    /// was added — adding an existing id is a no-op.
    pub fn add_node(&mut self, message: Message) -> bool {
        if self.nodes.contains_key(&message.id) {
            return false;
        }
        let id = message.id;
        if message.reply_to_id.is_some() {
            self.unexplored_references.insert(id);
        }
        self.temporal_frontier.insert(id);
        self.nodes.insert(id, message);
        true
    }

    pub fn mark_reference_explored(&mut self, id: MessageId) {
        self.unexplored_references.remove(&id);
    }

    pub fn remove_from_temporal_frontier(&mut self, id: MessageId) {
        self.temporal_frontier.remove(&id);
    }

    pub fn get_unexplored_references(&self) -> Vec<MessageId> {
        self.unexplored_references.iter().copied().collect()
    }

    pub fn temporal_frontier_len(&self) -> usize {
        self.temporal_frontier.len()
    }

    pub fn contains_in_temporal_frontier(&self, id: MessageId) -> bool {
        self.temporal_frontier.contains(&id)
    }

    /// Frontier ids ordered newest-first by `created_at`, ties broken by id
    /// descending for determinism.
    pub fn temporal_frontier_newest_first(&self) -> Vec<MessageId> {
        let mut ids: Vec<MessageId> = self.temporal_frontier.iter().copied().collect();
        ids.sort_by(|a, b| {
            let ta = self.nodes[a].created_at;
            let tb = self.nodes[b].created_at;
            tb.cmp(&ta).then(b.cmp(a))
        });
        ids
    }

    /// Emits nodes in ascending `created_at` order, ties broken by id
    /// ascending.
    pub fn to_chronological_conversation(&self) -> Vec<ConversationMessage> {
        let mut messages: Vec<&Message> = self.nodes.values().collect();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        messages.into_iter().map(ConversationMessage::from).collect()
    }
}

/// Wraps `ChatAdapter::fetch_message`/`fetch_history` in a cache that
/// memoizes every fetched message by id and the `id -> previous message`
/// relation derived from each bulk history response, so a fully-linear walk
/// serves almost all of its single-step temporal queries without further
/// network calls.
pub struct CachedHistoryFetcher {
    adapter: Arc<dyn ChatAdapter>,
    guild_id: GuildId,
    message_cache: Mutex<HashMap<MessageId, Message>>,
    previous_of: Mutex<HashMap<MessageId, MessageId>>,
    bulk_calls: AtomicU32,
}

impl CachedHistoryFetcher {
    pub fn new(adapter: Arc<dyn ChatAdapter>, guild_id: GuildId) -> Self {
        Self {
            adapter,
            guild_id,
            message_cache: Mutex::new(HashMap::new()),
            previous_of: Mutex::new(HashMap::new()),
            bulk_calls: AtomicU32::new(0),
        }
    }

    /// Number of `fetch_history` calls issued so far — exposed for the
    /// fetch-call-efficiency testable property.
    pub fn bulk_call_count(&self) -> u32 {
        self.bulk_calls.load(Ordering::SeqCst)
    }

    fn cache_message(&self, message: Message) {
        self.message_cache
            .lock()
            .unwrap()
            .insert(message.id, message);
    }

    /// A single-message lookup. Adapter failures are logged and treated as
    /// "absent" per the graph builder's failure-handling contract — they
    /// never propagate.
    pub async fn get_message_by_id(&self, id: MessageId) -> Option<Message> {
        if let Some(m) = self.message_cache.lock().unwrap().get(&id).cloned() {
            return Some(m);
        }
        match self.adapter.fetch_message(self.guild_id, id).await {
            Ok(Some(m)) => {
                self.cache_message(m.clone());
                Some(m)
            }
            Ok(None) => None,
            Err(e) => {
                debug!(id = %id, err = %e, "single-message fetch failed, treating as absent");
                None
            }
        }
    }

    /// Fetches (and caches) up to `BULK_HISTORY_PAGE` predecessors of
    /// `before_id`, newest-first, and derives the `id -> previous` relation
    /// from the returned run. Propagates adapter errors so the caller can
    /// decide to stop the build loop.
    pub async fn get_bulk_history(&self, before_id: MessageId) -> Result<Vec<Message>, GraphError> {
        self.bulk_calls.fetch_add(1, Ordering::SeqCst);
        let page = self
            .adapter
            .fetch_history(self.guild_id, before_id, BULK_HISTORY_PAGE)
            .await?;

        let mut previous_of = self.previous_of.lock().unwrap();
        let mut message_cache = self.message_cache.lock().unwrap();

        let mut prior = before_id;
        for msg in &page {
            previous_of.insert(prior, msg.id);
            message_cache.insert(msg.id, msg.clone());
            prior = msg.id;
        }

        Ok(page)
    }

    /// The immediately-prior channel message, served from cache when a
    /// previous bulk fetch already covered it.
    pub async fn get_previous_message(
        &self,
        id: MessageId,
    ) -> Result<Option<Message>, GraphError> {
        let cached_prev_id = self.previous_of.lock().unwrap().get(&id).copied();
        if let Some(prev_id) = cached_prev_id {
            return Ok(self.message_cache.lock().unwrap().get(&prev_id).cloned());
        }

        let page = self.get_bulk_history(id).await?;
        Ok(page.into_iter().next())
    }
}

/// Assembles the relevant prior context around a trigger message by
/// alternating reply-chain traversal (TIK) and temporal neighbor expansion
/// (TOK) until a size bound is hit or a full pass makes no progress.
pub struct ConversationGraphBuilder {
    fetcher: Arc<CachedHistoryFetcher>,
}

impl ConversationGraphBuilder {
    pub fn new(fetcher: Arc<CachedHistoryFetcher>) -> Self {
        Self { fetcher }
    }

    /// TIK step: for every node with an unfollowed reply edge, fetch the
    /// referenced message if not already present, then mark the reference
    /// explored regardless of outcome.
    async fn explore_references(&self, graph: &mut MessageGraph) {
        for id in graph.get_unexplored_references() {
            let reply_to = graph.get(id).and_then(|m| m.reply_to_id);
            if let Some(target) = reply_to {
                if !graph.contains(target) {
                    if let Some(msg) = self.fetcher.get_message_by_id(target).await {
                        graph.add_node(msg);
                    }
                }
            }
            graph.mark_reference_explored(id);
        }
    }

    /// TOK step: for every node in the temporal frontier, newest-first,
    /// fetch its immediate predecessor and admit it if the time gap is
    /// within threshold; seal the node from the frontier either way.
    async fn explore_temporal_neighbors(
        &self,
        graph: &mut MessageGraph,
        time_threshold_minutes: i64,
    ) -> Result<(), GraphError> {
        let threshold = Duration::minutes(time_threshold_minutes);
        for id in graph.temporal_frontier_newest_first() {
            let current_created_at = match graph.get(id) {
                Some(m) => m.created_at,
                None => continue,
            };

            let result = self.fetcher.get_previous_message(id).await;
            graph.remove_from_temporal_frontier(id);

            match result {
                Ok(Some(prev)) => {
                    let gap = current_created_at.signed_duration_since(prev.created_at);
                    if gap <= threshold {
                        graph.add_node(prev);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(id = %id, err = %e, "bulk history fetch failed, stopping exploration");
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Seeds the graph with `trigger` and up to `min_linear - 1` of its
    /// immediate predecessors, fetched in one bulk call.
    async fn seed_linear_history(&self, graph: &mut MessageGraph, trigger: Message, min_linear: usize) {
        let trigger_id = trigger.id;
        graph.add_node(trigger);

        if min_linear <= 1 {
            return;
        }

        match self.fetcher.get_bulk_history(trigger_id).await {
            Ok(page) => {
                for msg in page.into_iter().take(min_linear - 1) {
                    graph.add_node(msg);
                }
            }
            Err(e) => {
                warn!(err = %e, "seed bulk history fetch failed, starting from trigger alone");
            }
        }
    }

    /// Runs the full TIK/TOK alternation and returns the assembled
    /// conversation in ascending `created_at` order.
    pub async fn build_conversation_graph(
        &self,
        trigger: Message,
        min_linear: usize,
        max_total: usize,
        time_threshold_minutes: i64,
    ) -> Vec<ConversationMessage> {
        let mut graph = MessageGraph::new();
        self.seed_linear_history(&mut graph, trigger, min_linear).await;

        loop {
            let previous_size = graph.len();
            if graph.len() >= max_total {
                break;
            }

            self.explore_references(&mut graph).await;

            if graph.len() >= max_total {
                break;
            }

            if self
                .explore_temporal_neighbors(&mut graph, time_threshold_minutes)
                .await
                .is_err()
            {
                break;
            }

            if graph.len() == previous_size {
                break;
            }
        }

        graph.to_chronological_conversation()
    }
}
