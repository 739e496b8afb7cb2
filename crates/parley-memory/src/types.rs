use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use parley_core::ids::UserId;

/// `user_id -> summary` for everyone active on a given date.
pub type DailySummaryMap = HashMap<UserId, String>;

/// A day's summaries as held in the distributed cache, with the timestamp
/// staleness is measured against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedDailySummary {
    pub summaries: DailySummaryMap,
    pub created_at: DateTime<Utc>,
}

/// A normalized message handed to `ingest_message`, persisted for later
/// same-day or historical summarization.
#[derive(Debug, Clone)]
pub struct IngestedMessage {
    pub message_id: u64,
    pub author_id: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub reply_to_id: Option<u64>,
}

/// Schema-typed response from a single batch `create_daily_summaries` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailySummariesResponse {
    pub summaries: Vec<UserSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub user_id: u64,
    pub summary: String,
}

/// Schema-typed response from `merge_context`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeContextResponse {
    pub context: String,
}

/// Schema-typed response from alias extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AliasExtractionResponse {
    pub aliases: Vec<String>,
}

/// One date's worth of summary, paired with the date it covers, for
/// building the `merge_context` prompt.
#[derive(Debug, Clone)]
pub struct DatedSummary {
    pub date: NaiveDate,
    pub summary: String,
}
