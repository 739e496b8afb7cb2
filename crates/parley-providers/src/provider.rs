use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A single turn in a chat-style request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// A single user/assistant turn used to few-shot a provider that supports it.
#[derive(Debug, Clone)]
pub struct FewShotPair {
    pub user: String,
    pub assistant: String,
}

/// An inline image attached to a generation request. Providers that can't
/// accept images reject the request with `ProviderError::Unsupported`.
#[derive(Debug, Clone)]
pub struct ImageInput {
    pub media_type: String,
    pub base64_data: String,
}

/// Request to an LLM provider's `generate` operation (C1).
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub system_prompt: String,
    #[allow(dead_code)]
    pub few_shot_pairs: Vec<String>,
    pub messages: Vec<Message>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Ask the provider to search the web / ground its answer before
    /// replying. Rejected with `ProviderError::Unsupported` on models that
    /// don't offer it.
    pub enable_grounding: bool,
    /// JSON Schema the reply must validate against. When the concrete
    /// provider has no native structured-output mode, `structured::generate`
    /// instructs the model in-prompt and parses the result.
    pub response_schema: Option<serde_json::Value>,
    pub image: Option<ImageInput>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system_prompt: system_prompt.into(),
            few_shot_pairs: Vec::new(),
            messages: Vec::new(),
            temperature: 0.7,
            max_tokens: 4096,
            enable_grounding: false,
            response_schema: None,
            image: None,
        }
    }

    pub fn with_user_message(mut self, content: impl Into<String>) -> Self {
        self.messages.push(Message {
            role: Role::User,
            content: content.into(),
        });
        self
    }
}

/// Response from an LLM provider (non-streaming; this pipeline never
/// streams a reply to the caller).
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub model: String,
    pub tokens_in: u32,
    pub tokens_out: u32,
}

/// Common interface for all LLM providers (Anthropic, and any
/// OpenAI-wire-compatible backend).
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name for logging and error messages.
    fn name(&self) -> &str;

    /// Send a single generation request, wait for the full response.
    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError>;

    /// Whether this provider has a native JSON-schema / structured-output
    /// mode. When `false`, `structured::generate` falls back to in-prompt
    /// instruction + parse + corrective retries.
    fn supports_native_schema(&self) -> bool {
        false
    }

    fn supports_grounding(&self) -> bool {
        false
    }

    fn supports_images(&self) -> bool {
        false
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// The provider refused the request on content-policy grounds. Never
    /// retried by `RetryProvider`; still advances `CompositeProvider` to the
    /// next slot, since it is a non-result for this input.
    #[error("blocked by content policy: {0}")]
    Blocked(String),

    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("unsupported request option: {0}")]
    Unsupported(String),

    #[error("all providers in composite failed: {0}")]
    Composite(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl ProviderError {
    pub fn is_blocked(&self) -> bool {
        matches!(self, ProviderError::Blocked(_))
    }
}
