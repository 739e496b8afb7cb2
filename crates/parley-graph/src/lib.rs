//! `parley-graph` — conversation context assembly (C4) and canonical
//! rendering (C5).
//!
//! `ConversationGraphBuilder` walks reply chains and channel order outward
//! from a trigger message until a size bound is hit or a pass makes no
//! progress; `ConversationFormatter` turns the assembled graph into the XML
//! block the providers are prompted with. Neither component knows anything
//! about the chat platform beyond the `ChatAdapter`/`UserDirectory` traits
//! defined here.

pub mod adapter;
pub mod error;
pub mod formatter;
pub mod graph;
pub mod message;

pub use adapter::{ChatAdapter, UserDirectory};
pub use error::GraphError;
pub use formatter::ConversationFormatter;
pub use graph::{CachedHistoryFetcher, ConversationGraphBuilder, MessageGraph};
pub use message::{ConversationMessage, Message};
