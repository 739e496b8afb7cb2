use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::provider::{ChatRequest, ChatResponse, LlmProvider, ProviderError};
use crate::registry;

/// One client against any OpenAI-wire-compatible chat-completions endpoint.
/// Used for every `GeneralParams::ai_backend` other than `claude`
/// (gemini_flash, grok, gemma, codex all speak this wire format).
pub struct OpenAiCompatProvider {
    client: reqwest::Client,
    name: String,
    api_key: String,
    endpoint: String,
}

impl OpenAiCompatProvider {
    pub fn new(name: impl Into<String>, api_key: String, endpoint: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            name: name.into(),
            api_key,
            endpoint,
        }
    }

    /// Build a client for a known backend id (see `registry::KNOWN_PROVIDERS`),
    /// optionally overriding the base endpoint for a custom deployment.
    pub fn for_known_backend(
        id: &str,
        api_key: String,
        base_url_override: Option<String>,
    ) -> Result<Self, ProviderError> {
        let known = registry::lookup(id)
            .ok_or_else(|| ProviderError::Unavailable(format!("unknown backend id: {id}")))?;
        let endpoint = base_url_override.unwrap_or_else(|| known.endpoint());
        Ok(Self::new(known.name, api_key, endpoint))
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        if req.image.is_some() {
            return Err(ProviderError::Unsupported(format!(
                "{} does not accept images in this pipeline",
                self.name
            )));
        }
        if req.enable_grounding {
            return Err(ProviderError::Unsupported(format!(
                "{} does not support grounding",
                self.name
            )));
        }

        let mut messages = vec![serde_json::json!({
            "role": "system",
            "content": req.system_prompt,
        })];
        messages.extend(req.messages.iter().map(|m| {
            serde_json::json!({
                "role": m.role,
                "content": m.content,
            })
        }));

        let mut body = serde_json::json!({
            "model": req.model,
            "messages": messages,
            "temperature": req.temperature,
            "max_tokens": req.max_tokens,
        });

        if let Some(schema) = &req.response_schema {
            body["response_format"] = serde_json::json!({
                "type": "json_schema",
                "json_schema": { "name": "response", "schema": schema, "strict": true },
            });
        }

        debug!(model = %req.model, provider = %self.name, "sending request");

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status == 429 {
            let retry = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(5000);
            return Err(ProviderError::RateLimited {
                retry_after_ms: retry,
            });
        }

        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, provider = %self.name, body = %text, "API error");
            if status == 400 && text.to_lowercase().contains("content") {
                return Err(ProviderError::Blocked(text));
            }
            return Err(ProviderError::Api {
                status,
                message: text,
            });
        }

        let api_resp: ApiResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        let choice = api_resp
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Parse("no choices in response".to_string()))?;

        if choice.finish_reason.as_deref() == Some("content_filter") {
            return Err(ProviderError::Blocked(
                "content filtered by provider".to_string(),
            ));
        }

        Ok(ChatResponse {
            content: choice.message.content,
            model: api_resp.model,
            tokens_in: api_resp.usage.as_ref().map(|u| u.prompt_tokens).unwrap_or(0),
            tokens_out: api_resp
                .usage
                .as_ref()
                .map(|u| u.completion_tokens)
                .unwrap_or(0),
        })
    }

    fn supports_native_schema(&self) -> bool {
        true
    }
}

#[derive(Deserialize)]
struct ApiResponse {
    model: String,
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[derive(Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}
