//! Built-in registry of OpenAI-wire-compatible endpoints — maps the backend
//! identifiers named in `GeneralParams::ai_backend` to their API endpoint
//! and a sane default model, so a config entry only needs an API key.

/// A well-known LLM provider that speaks the OpenAI chat-completions wire
/// format.
pub struct KnownProvider {
    /// Short identifier, matches `GeneralParams::ai_backend` values.
    pub id: &'static str,
    pub name: &'static str,
    /// Base URL without trailing slash.
    pub base_url: &'static str,
    /// Path appended to base_url for chat completions.
    pub chat_path: &'static str,
    pub default_model: &'static str,
}

impl KnownProvider {
    pub fn endpoint(&self) -> String {
        format!("{}{}", self.base_url, self.chat_path)
    }
}

pub const KNOWN_PROVIDERS: &[KnownProvider] = &[
    KnownProvider {
        id: "gemini_flash",
        name: "Google AI (Gemini Flash)",
        base_url: "https://generativelanguage.googleapis.com/v1beta/openai",
        chat_path: "/chat/completions",
        default_model: "gemini-2.0-flash",
    },
    KnownProvider {
        id: "grok",
        name: "xAI (Grok)",
        base_url: "https://api.x.ai",
        chat_path: "/v1/chat/completions",
        default_model: "grok-2-latest",
    },
    KnownProvider {
        id: "gemma",
        name: "Google AI (Gemma, via OpenAI-compatible endpoint)",
        base_url: "https://generativelanguage.googleapis.com/v1beta/openai",
        chat_path: "/chat/completions",
        default_model: "gemma-2-27b-it",
    },
    KnownProvider {
        id: "codex",
        name: "OpenAI",
        base_url: "https://api.openai.com",
        chat_path: "/v1/chat/completions",
        default_model: "gpt-4o",
    },
];

/// Look up a known provider by its `ai_backend` identifier.
pub fn lookup(id: &str) -> Option<&'static KnownProvider> {
    KNOWN_PROVIDERS.iter().find(|p| p.id == id)
}
