//! `parley-providers` — the LLM provider abstraction: one trait for a
//! concrete backend (C1), a bounded-retry wrapper (C2), an ordered/shuffled
//! fallback wrapper with a bad-response predicate (C3), and schema-typed
//! generation built on top of all three.

pub mod anthropic;
pub mod composite;
pub mod openai_compat;
pub mod provider;
pub mod registry;
pub mod retry;
pub mod structured;

pub use anthropic::AnthropicProvider;
pub use composite::CompositeProvider;
pub use openai_compat::OpenAiCompatProvider;
pub use provider::{
    ChatRequest, ChatResponse, FewShotPair, ImageInput, LlmProvider, Message, ProviderError, Role,
};
pub use retry::{RetryBound, RetryProvider};
