//! `parley-core` — shared configuration, error types and domain identifiers
//! for the parley reasoning pipeline.
//!
//! Every other `parley-*` crate depends on this one and nothing else in the
//! workspace; it carries no provider, storage or chat-platform knowledge.

pub mod config;
pub mod error;
pub mod ids;

pub use config::ParleyConfig;
pub use error::{ParleyError, Result};
pub use ids::{GuildId, MessageId, UserId};
