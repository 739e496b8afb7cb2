use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies the guild/server a conversation belongs to. Backed by a plain
/// integer because every chat platform this reasoning core is wired to
/// (see `ChatAdapter`) hands out stable numeric guild ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GuildId(pub u64);

impl fmt::Display for GuildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for GuildId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Identifies a user within a guild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for UserId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Identifies a single message. Ids are assumed stable and unique within a
/// guild but not assumed to be comparable across guilds — the conversation
/// graph only ever compares ids within one guild's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for MessageId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}
