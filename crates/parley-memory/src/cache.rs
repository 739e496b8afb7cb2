use async_trait::async_trait;
use chrono::NaiveDate;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, ExistenceCheck, SetExpiry, SetOptions};
use tracing::warn;

use parley_core::ids::GuildId;

use crate::types::CachedDailySummary;

const DAILY_SUMMARY_TTL_SECS: u64 = 86_400;
const BUILD_LOCK_TTL_SECS: u64 = 600;

/// The shared-across-instances half of the memory stack: today's daily
/// summaries (short TTL, frequently stale) and the single-flight rebuild
/// lock. Every method swallows its own transport errors — a cache miss and
/// a cache failure are indistinguishable to the caller, matching the
/// fetch-best-effort contract the manager is built around.
#[async_trait]
pub trait DistributedCache: Send + Sync {
    async fn get_daily_summary(&self, guild_id: GuildId, date: NaiveDate) -> Option<CachedDailySummary>;
    async fn set_daily_summary(&self, guild_id: GuildId, date: NaiveDate, entry: &CachedDailySummary);
    async fn try_acquire_build_lock(&self, guild_id: GuildId, date: NaiveDate) -> bool;
    async fn release_build_lock(&self, guild_id: GuildId, date: NaiveDate);
}

pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    pub async fn connect(url: &str) -> redis::RedisResult<Self> {
        let client = Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self { conn })
    }

    fn daily_summary_key(guild_id: GuildId, date: NaiveDate) -> String {
        format!("daily_summary:{guild_id}:{date}")
    }

    fn lock_key(guild_id: GuildId, date: NaiveDate) -> String {
        format!("lock:daily:{guild_id}:{date}")
    }
}

#[async_trait]
impl DistributedCache for RedisCache {
    async fn get_daily_summary(&self, guild_id: GuildId, date: NaiveDate) -> Option<CachedDailySummary> {
        let key = Self::daily_summary_key(guild_id, date);
        let mut conn = self.conn.clone();
        let raw: Option<String> = match conn.get(&key).await {
            Ok(v) => v,
            Err(e) => {
                warn!(err = %e, key, "redis get_daily_summary failed");
                return None;
            }
        };
        raw.and_then(|s| match serde_json::from_str(&s) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(err = %e, key, "failed to decode cached daily summary");
                None
            }
        })
    }

    async fn set_daily_summary(&self, guild_id: GuildId, date: NaiveDate, entry: &CachedDailySummary) {
        let key = Self::daily_summary_key(guild_id, date);
        let raw = match serde_json::to_string(entry) {
            Ok(s) => s,
            Err(e) => {
                warn!(err = %e, key, "failed to encode daily summary for cache");
                return;
            }
        };
        let mut conn = self.conn.clone();
        if let Err(e) = conn
            .set_ex::<_, _, ()>(&key, raw, DAILY_SUMMARY_TTL_SECS)
            .await
        {
            warn!(err = %e, key, "redis set_daily_summary failed");
        }
    }

    async fn try_acquire_build_lock(&self, guild_id: GuildId, date: NaiveDate) -> bool {
        let key = Self::lock_key(guild_id, date);
        let mut conn = self.conn.clone();
        let opts = SetOptions::default()
            .conditional_set(ExistenceCheck::NX)
            .with_expiration(SetExpiry::EX(BUILD_LOCK_TTL_SECS));
        match conn.set_options::<_, _, Option<String>>(&key, "1", opts).await {
            Ok(Some(_)) => true,
            Ok(None) => false,
            Err(e) => {
                warn!(err = %e, key, "redis try_acquire_build_lock failed");
                false
            }
        }
    }

    async fn release_build_lock(&self, guild_id: GuildId, date: NaiveDate) {
        let key = Self::lock_key(guild_id, date);
        let mut conn = self.conn.clone();
        if let Err(e) = conn.del::<_, ()>(&key).await {
            warn!(err = %e, key, "redis release_build_lock failed");
        }
    }
}
