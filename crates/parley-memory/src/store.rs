use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use parley_core::ids::{GuildId, UserId};

use crate::error::MemoryError;
use crate::types::{DailySummaryMap, IngestedMessage};

/// The durable half of the memory stack: long-term facts, historical daily
/// summaries (which never expire once written) and the raw message log
/// `create_daily_summaries` reads from.
#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn get_user_facts(&self, guild_id: GuildId, user_id: UserId) -> Result<Option<String>, MemoryError>;

    async fn set_user_facts(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        facts: &str,
    ) -> Result<(), MemoryError>;

    async fn has_chat_messages_for_date(
        &self,
        guild_id: GuildId,
        date: NaiveDate,
    ) -> Result<bool, MemoryError>;

    async fn get_chat_messages_for_date(
        &self,
        guild_id: GuildId,
        date: NaiveDate,
    ) -> Result<Vec<IngestedMessage>, MemoryError>;

    async fn add_chat_message(
        &self,
        guild_id: GuildId,
        message: &IngestedMessage,
    ) -> Result<(), MemoryError>;

    async fn get_daily_summaries(
        &self,
        guild_id: GuildId,
        date: NaiveDate,
    ) -> Result<Option<DailySummaryMap>, MemoryError>;

    async fn save_daily_summaries(
        &self,
        guild_id: GuildId,
        date: NaiveDate,
        summaries: &DailySummaryMap,
    ) -> Result<(), MemoryError>;
}

pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(path: &str) -> Result<Self, MemoryError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn from_connection(conn: Connection) -> Result<Self, MemoryError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS user_facts (
                guild_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                facts TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (guild_id, user_id)
            );
            CREATE TABLE IF NOT EXISTS chat_messages (
                guild_id INTEGER NOT NULL,
                date TEXT NOT NULL,
                message_id INTEGER NOT NULL,
                author_id INTEGER NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL,
                reply_to_id INTEGER,
                PRIMARY KEY (guild_id, message_id)
            );
            CREATE INDEX IF NOT EXISTS idx_chat_messages_by_date
                ON chat_messages (guild_id, date);
            CREATE TABLE IF NOT EXISTS daily_summaries (
                guild_id INTEGER NOT NULL,
                date TEXT NOT NULL,
                user_id INTEGER NOT NULL,
                summary TEXT NOT NULL,
                PRIMARY KEY (guild_id, date, user_id)
            );",
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn blocking<F, T>(&self, f: F) -> Result<T, MemoryError>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().unwrap();
            f(&guard)
        })
        .await
        .expect("sqlite worker thread panicked")
        .map_err(MemoryError::from)
    }
}

#[async_trait]
impl DurableStore for SqliteStore {
    async fn get_user_facts(&self, guild_id: GuildId, user_id: UserId) -> Result<Option<String>, MemoryError> {
        let (guild, user) = (guild_id.0 as i64, user_id.0 as i64);
        self.blocking(move |conn| {
            conn.query_row(
                "SELECT facts FROM user_facts WHERE guild_id = ?1 AND user_id = ?2",
                params![guild, user],
                |row| row.get(0),
            )
            .optional()
        })
        .await
    }

    async fn set_user_facts(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        facts: &str,
    ) -> Result<(), MemoryError> {
        let (guild, user, facts, now) = (
            guild_id.0 as i64,
            user_id.0 as i64,
            facts.to_string(),
            Utc::now().to_rfc3339(),
        );
        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO user_facts (guild_id, user_id, facts, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(guild_id, user_id) DO UPDATE SET facts = ?3, updated_at = ?4",
                params![guild, user, facts, now],
            )?;
            Ok(())
        })
        .await
    }

    async fn has_chat_messages_for_date(
        &self,
        guild_id: GuildId,
        date: NaiveDate,
    ) -> Result<bool, MemoryError> {
        let (guild, date) = (guild_id.0 as i64, date.to_string());
        self.blocking(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM chat_messages WHERE guild_id = ?1 AND date = ?2",
                params![guild, date],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
        .await
    }

    async fn get_chat_messages_for_date(
        &self,
        guild_id: GuildId,
        date: NaiveDate,
    ) -> Result<Vec<IngestedMessage>, MemoryError> {
        let (guild, date) = (guild_id.0 as i64, date.to_string());
        self.blocking(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT message_id, author_id, content, created_at, reply_to_id
                 FROM chat_messages WHERE guild_id = ?1 AND date = ?2
                 ORDER BY created_at ASC",
            )?;
            let rows = stmt.query_map(params![guild, date], |row| {
                let created_at_raw: String = row.get(3)?;
                let author_id: i64 = row.get(1)?;
                let reply_to_id: Option<i64> = row.get(4)?;
                Ok(IngestedMessage {
                    message_id: row.get::<_, i64>(0)? as u64,
                    author_id: UserId(author_id as u64),
                    content: row.get(2)?,
                    created_at: DateTime::parse_from_rfc3339(&created_at_raw)
                        .map(|dt| dt.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now()),
                    reply_to_id: reply_to_id.map(|id| id as u64),
                })
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })
        .await
    }

    async fn add_chat_message(
        &self,
        guild_id: GuildId,
        message: &IngestedMessage,
    ) -> Result<(), MemoryError> {
        let guild = guild_id.0 as i64;
        let date = message.created_at.date_naive().to_string();
        let message_id = message.message_id as i64;
        let author_id = message.author_id.0 as i64;
        let content = message.content.clone();
        let created_at = message.created_at.to_rfc3339();
        let reply_to_id = message.reply_to_id.map(|id| id as i64);

        self.blocking(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO chat_messages
                 (guild_id, date, message_id, author_id, content, created_at, reply_to_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![guild, date, message_id, author_id, content, created_at, reply_to_id],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_daily_summaries(
        &self,
        guild_id: GuildId,
        date: NaiveDate,
    ) -> Result<Option<DailySummaryMap>, MemoryError> {
        let (guild, date_str) = (guild_id.0 as i64, date.to_string());
        self.blocking(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id, summary FROM daily_summaries WHERE guild_id = ?1 AND date = ?2",
            )?;
            let rows = stmt.query_map(params![guild, date_str], |row| {
                let user_id: i64 = row.get(0)?;
                let summary: String = row.get(1)?;
                Ok((UserId(user_id as u64), summary))
            })?;
            let map: DailySummaryMap = rows.collect::<rusqlite::Result<_>>()?;
            Ok(if map.is_empty() { None } else { Some(map) })
        })
        .await
    }

    async fn save_daily_summaries(
        &self,
        guild_id: GuildId,
        date: NaiveDate,
        summaries: &DailySummaryMap,
    ) -> Result<(), MemoryError> {
        let guild = guild_id.0 as i64;
        let date_str = date.to_string();
        let entries: Vec<(i64, String)> = summaries
            .iter()
            .map(|(uid, summary)| (uid.0 as i64, summary.clone()))
            .collect();

        self.blocking(move |conn| {
            for (user_id, summary) in entries {
                conn.execute(
                    "INSERT OR REPLACE INTO daily_summaries (guild_id, date, user_id, summary)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![guild, date_str, user_id, summary],
                )?;
            }
            Ok(())
        })
        .await
    }
}
