//! `parley-memory` — the memory manager (C6): persistent facts, a rolling
//! week of daily summaries, and the AI-merged narrative combining them.
//!
//! Splits cleanly along the durability axis: `DurableStore` (facts,
//! historical summaries, the raw message log) never expires what it holds;
//! `DistributedCache` (today's summaries, the single-flight rebuild lock)
//! is allowed to be stale, cold, or simply gone.

pub mod cache;
pub mod error;
pub mod manager;
pub mod store;
pub mod types;

pub use cache::{DistributedCache, RedisCache};
pub use error::MemoryError;
pub use manager::MemoryManager;
pub use store::{DurableStore, SqliteStore};
pub use types::{CachedDailySummary, DailySummaryMap, IngestedMessage};
