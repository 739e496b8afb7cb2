use serde::de::DeserializeOwned;

use crate::provider::{ChatRequest, LlmProvider, Message, ProviderError, Role};

/// Calls `provider` and parses its reply as `T`, instructing the model
/// in-prompt when the provider has no native schema mode. On a bad parse,
/// up to two corrective rounds are issued: the invalid prior reply and a
/// short hint are appended as chat turns before retrying. A third failure
/// is a parse error.
pub async fn generate<T: DeserializeOwned>(
    provider: &dyn LlmProvider,
    mut req: ChatRequest,
) -> Result<T, ProviderError> {
    let schema = req
        .response_schema
        .clone()
        .ok_or_else(|| ProviderError::Parse("generate::<T> requires response_schema".into()))?;

    if !provider.supports_native_schema() {
        req.system_prompt = format!(
            "{}\n\nRespond with a single JSON object matching this schema, and nothing else:\n{}",
            req.system_prompt, schema
        );
    }

    let mut attempt: u32 = 0;
    loop {
        let resp = provider.send(&req).await?;
        match parse_reply::<T>(&resp.content) {
            Ok(value) => return Ok(value),
            Err(parse_err) => {
                attempt += 1;
                if attempt > 2 {
                    return Err(ProviderError::Parse(parse_err));
                }
                req.messages.push(Message {
                    role: Role::Assistant,
                    content: resp.content,
                });
                req.messages.push(Message {
                    role: Role::User,
                    content: format!(
                        "That reply did not validate against the required schema ({parse_err}). \
                         Respond again with only a JSON object matching the fields: {schema}."
                    ),
                });
            }
        }
    }
}

fn parse_reply<T: DeserializeOwned>(raw: &str) -> Result<T, String> {
    let cleaned = strip_markdown_fences(raw);
    serde_json::from_str(&cleaned).map_err(|e| e.to_string())
}

fn strip_markdown_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.trim_start_matches('\n');
    match rest.rfind("```") {
        Some(end) => rest[..end].trim().to_string(),
        None => rest.trim().to_string(),
    }
}
