//! Language detection and language-name lookup.
//!
//! The upstream detector tried an offline classifier first and only fell
//! back to the model for short or ambiguous text. Nothing in this crate's
//! dependency stack offers an offline-detection crate, so this is an
//! LLM-only port: every call goes through `ai_client`, with the same
//! Cyrillic/Latin disambiguation guidance and the same `"en"` default on
//! failure or on a malformed code.

use std::collections::HashMap;
use std::sync::Mutex;

use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use parley_providers::{structured, ChatRequest, LlmProvider};

fn language_code_pattern() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z]{2,3}(-[a-z]{2,4})?$").unwrap())
}

#[derive(Debug, Clone, Deserialize)]
struct LanguageCodeResponse {
    language_code: String,
}

fn language_code_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": { "language_code": { "type": "string" } },
        "required": ["language_code"]
    })
}

#[derive(Debug, Clone, Deserialize)]
struct LanguageNameResponse {
    language_name: String,
}

fn language_name_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": { "language_name": { "type": "string" } },
        "required": ["language_name"]
    })
}

const DETECT_PROMPT: &str = "Identify the ISO 639-1 (or 639-3 where 639-1 has no code) language code of the given text. If the text uses Cyrillic letters and the language is ambiguous, gravitate towards Russian ('ru'). If the text uses Latin letters and the language is ambiguous between several European languages, gravitate towards English ('en') or whichever language is most common for the context.";

/// Detects the language of short conversational text and resolves a
/// language code to a human-readable name, caching the latter.
pub struct LanguageDetector {
    provider: std::sync::Arc<dyn LlmProvider>,
    model: String,
    name_cache: Mutex<HashMap<String, String>>,
}

impl LanguageDetector {
    pub fn new(provider: std::sync::Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        let mut seed = HashMap::new();
        for (code, name) in [
            ("en", "English"),
            ("zh", "Chinese"),
            ("es", "Spanish"),
            ("fr", "French"),
            ("ru", "Russian"),
            ("ja", "Japanese"),
        ] {
            seed.insert(code.to_string(), name.to_string());
        }
        Self {
            provider,
            model: model.into(),
            name_cache: Mutex::new(seed),
        }
    }

    /// Detects the language of `text`. Defaults to `"en"` on any provider
    /// failure or a model reply that doesn't look like a language code —
    /// this path must never fail the caller's request just because
    /// detection had a bad day.
    pub async fn detect_language(&self, text: &str) -> String {
        if text.trim().is_empty() {
            warn!("detect_language called with empty text, defaulting to en");
            return "en".to_string();
        }

        let mut req = ChatRequest::new(&self.model, DETECT_PROMPT).with_user_message(text);
        req.temperature = 0.0;
        req.response_schema = Some(language_code_schema());

        match structured::generate::<LanguageCodeResponse>(self.provider.as_ref(), req).await {
            Ok(resp) if language_code_pattern().is_match(&resp.language_code) => resp.language_code,
            Ok(resp) => {
                warn!(code = %resp.language_code, "language detector returned a malformed code, defaulting to en");
                "en".to_string()
            }
            Err(e) => {
                warn!(err = %e, "language detection failed, defaulting to en");
                "en".to_string()
            }
        }
    }

    /// Resolves a language code to its display name, e.g. `"ru"` ->
    /// `"Russian"`. Cache-first; falls back to `"Language-{code}"` on
    /// provider failure.
    pub async fn get_language_name(&self, language_code: &str) -> String {
        if let Some(cached) = self.name_cache.lock().unwrap().get(language_code).cloned() {
            return cached;
        }

        let mut req = ChatRequest::new(
            &self.model,
            "Give the full English name of the language for the given ISO code, and nothing else.",
        )
        .with_user_message(language_code);
        req.temperature = 0.0;
        req.response_schema = Some(language_name_schema());

        let name = match structured::generate::<LanguageNameResponse>(self.provider.as_ref(), req).await {
            Ok(resp) => title_case(resp.language_name.trim()),
            Err(e) => {
                warn!(err = %e, code = language_code, "language name lookup failed");
                return format!("Language-{language_code}");
            }
        };

        self.name_cache
            .lock()
            .unwrap()
            .insert(language_code.to_string(), name.clone());
        name
    }
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parley_providers::{ChatResponse, ProviderError};
    use std::sync::Arc;

    struct ScriptedProvider(String);

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }
        async fn send(&self, _req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
            Ok(ChatResponse {
                content: self.0.clone(),
                model: "m".into(),
                tokens_in: 1,
                tokens_out: 1,
            })
        }
        fn supports_native_schema(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn detects_language_from_a_well_formed_reply() {
        let detector = LanguageDetector::new(
            Arc::new(ScriptedProvider(r#"{"language_code":"ru"}"#.into())),
            "m",
        );
        assert_eq!(detector.detect_language("привет").await, "ru");
    }

    #[tokio::test]
    async fn malformed_code_defaults_to_english() {
        let detector = LanguageDetector::new(
            Arc::new(ScriptedProvider(r#"{"language_code":"NOT A CODE"}"#.into())),
            "m",
        );
        assert_eq!(detector.detect_language("hello").await, "en");
    }

    #[tokio::test]
    async fn empty_text_short_circuits_to_english_without_a_call() {
        let detector = LanguageDetector::new(Arc::new(ScriptedProvider(String::new())), "m");
        assert_eq!(detector.detect_language("   ").await, "en");
    }

    #[tokio::test]
    async fn language_name_lookup_is_cached_after_first_resolution() {
        let detector = LanguageDetector::new(
            Arc::new(ScriptedProvider(r#"{"language_name":"korean"}"#.into())),
            "m",
        );
        assert_eq!(detector.get_language_name("ko").await, "Korean");
    }

    #[tokio::test]
    async fn seeded_names_never_reach_the_provider() {
        struct PanicProvider;
        #[async_trait]
        impl LlmProvider for PanicProvider {
            fn name(&self) -> &str {
                "panics"
            }
            async fn send(&self, _req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
                panic!("seeded language names must not call the provider");
            }
        }
        let detector = LanguageDetector::new(Arc::new(PanicProvider), "m");
        assert_eq!(detector.get_language_name("en").await, "English");
    }
}
