//! Tagged route decision and per-route parameter shapes (C7's data model).
//!
//! Field-for-field mirror of the structured-output schemas the original
//! router and its downstream generators were built against: one request
//! gets classified into exactly one `Route`, and each route except
//! `None`/`NotSure` carries its own parameter struct.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Route {
    Famous,
    General,
    Fact,
    None,
    #[serde(rename = "NOTSURE")]
    NotSure,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Famous => "FAMOUS",
            Route::General => "GENERAL",
            Route::Fact => "FACT",
            Route::None => "NONE",
            Route::NotSure => "NOTSURE",
        }
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tier-1 output: which route to take, and why (kept for logging, never
/// shown to the end user).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteSelection {
    pub route: Route,
    pub reason: String,
}

pub fn route_selection_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "route": { "type": "string", "enum": ["FAMOUS", "GENERAL", "FACT", "NONE", "NOTSURE"] },
            "reason": { "type": "string" }
        },
        "required": ["route", "reason"]
    })
}

/// Every route's parameters carry these two fields once tier-2 extraction
/// has run and language detection has been annotated onto the result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LanguageTag {
    pub language_code: Option<String>,
    pub language_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamousParams {
    pub famous_person: String,
    #[serde(flatten)]
    pub language: LanguageTag,
}

pub fn famous_params_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "famous_person": { "type": "string" }
        },
        "required": ["famous_person"]
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiBackend {
    GeminiFlash,
    Grok,
    Claude,
    Gemma,
    Codex,
}

impl AiBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            AiBackend::GeminiFlash => "gemini_flash",
            AiBackend::Grok => "grok",
            AiBackend::Claude => "claude",
            AiBackend::Gemma => "gemma",
            AiBackend::Codex => "codex",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralParams {
    pub ai_backend: AiBackend,
    pub temperature: f32,
    pub cleaned_query: String,
    #[serde(flatten)]
    pub language: LanguageTag,
}

pub fn general_params_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "ai_backend": {
                "type": "string",
                "enum": ["gemini_flash", "grok", "claude", "gemma", "codex"],
                "description": "gemini_flash for general questions, grok for creative tasks, claude for technical work, codex for research, gemma only if explicitly requested"
            },
            "temperature": {
                "type": "number",
                "minimum": 0.0,
                "maximum": 1.0,
                "description": "0.1-0.3 for factual/precise, 0.4-0.6 for balanced, 0.7-0.9 for creative"
            },
            "cleaned_query": {
                "type": "string",
                "description": "the request with bot-mention and routing instructions removed"
            }
        },
        "required": ["ai_backend", "temperature", "cleaned_query"]
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactOperation {
    Remember,
    Forget,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactParams {
    pub operation: FactOperation,
    pub user_mention: String,
    pub fact_content: String,
    #[serde(flatten)]
    pub language: LanguageTag,
}

pub fn fact_params_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "operation": { "type": "string", "enum": ["remember", "forget"] },
            "user_mention": {
                "type": "string",
                "description": "a Discord-style mention like '<@123456>' or a recognizable nickname"
            },
            "fact_content": { "type": "string" }
        },
        "required": ["operation", "user_mention", "fact_content"]
    })
}

/// Whatever tier-2 extraction produced, narrowed by the tier-1 `Route`.
/// `None`/`NotSure` carry nothing: `None` means no reply is owed, and
/// `NotSure` never survives the router's own composite escalation (see
/// `router.rs`).
#[derive(Debug, Clone)]
pub enum RouteParameters {
    Famous(FamousParams),
    General(GeneralParams),
    Fact(FactParams),
    None,
}

/// Response to a FACT `remember` operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryUpdateResponse {
    pub updated_memory: String,
    pub confirmation_message: String,
}

pub fn memory_update_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "updated_memory": { "type": "string" },
            "confirmation_message": { "type": "string" }
        },
        "required": ["updated_memory", "confirmation_message"]
    })
}

/// Response to a FACT `forget` operation. `fact_found` gates whether
/// `updated_memory` actually gets persisted — see `dispatch.rs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryForgetResponse {
    pub updated_memory: String,
    pub fact_found: bool,
    pub confirmation_message: String,
}

pub fn memory_forget_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "updated_memory": { "type": "string" },
            "fact_found": { "type": "boolean" },
            "confirmation_message": { "type": "string" }
        },
        "required": ["updated_memory", "fact_found", "confirmation_message"]
    })
}

/// Reaction-triggered generator outputs. These routes are never reached
/// through `Router::route_request` — they are declared here because the
/// wider system's structured-output contract names them, but `dispatch.rs`
/// only ever produces `RouteParameters` for message-triggered routes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WisdomResponse {
    pub answer: String,
    pub reason: String,
}

pub fn wisdom_response_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "answer": { "type": "string" },
            "reason": { "type": "string" }
        },
        "required": ["answer", "reason"]
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevilsAdvocateResponse {
    pub answer: String,
    pub reason: String,
}

pub fn devils_advocate_response_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "answer": { "type": "string" },
            "reason": { "type": "string" }
        },
        "required": ["answer", "reason"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_serializes_to_the_bare_uppercase_tag() {
        assert_eq!(serde_json::to_value(Route::NotSure).unwrap(), json!("NOTSURE"));
        assert_eq!(serde_json::to_value(Route::Fact).unwrap(), json!("FACT"));
    }

    #[test]
    fn route_selection_round_trips_through_json() {
        let raw = json!({"route": "GENERAL", "reason": "it's a question"});
        let selection: RouteSelection = serde_json::from_value(raw).unwrap();
        assert_eq!(selection.route, Route::General);
    }

    #[test]
    fn language_tag_fields_flatten_onto_fact_params() {
        let raw = json!({
            "operation": "remember",
            "user_mention": "<@1>",
            "fact_content": "likes tea",
            "language_code": "en",
            "language_name": "English"
        });
        let params: FactParams = serde_json::from_value(raw).unwrap();
        assert_eq!(params.language.language_code.as_deref(), Some("en"));
    }
}
