//! Response post-processing (C9): summarize an overlong reply toward the
//! platform's length limit, falling back to a hard truncation if
//! summarization fails or still overruns.
//!
//! Grounded directly on `response_summarizer.py::ResponseSummarizer`.

use std::sync::Arc;

use tracing::{info, warn};

use parley_providers::{ChatRequest, LlmProvider};

const SUMMARIZATION_TEMPERATURE: f32 = 0.1;

fn summarize_prompt(target_length: usize) -> String {
    format!(
        "Summarize the following response to approximately {target_length} characters while \
         preserving all key information, main points, and the original tone.\n\n\
         The summary should be comprehensive and maintain the same style as the original response. \
         Aim for close to {target_length} characters - use the full space available. Do not add \
         any meta-commentary about the summarization process."
    )
}

/// Shrinks replies that exceed a platform's length limit. Built around one
/// dedicated summarization provider, separate from whatever generated the
/// original reply.
pub struct ResponsePostProcessor {
    provider: Arc<dyn LlmProvider>,
    model: String,
}

impl ResponsePostProcessor {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    /// Returns `original` unchanged if it already fits. Otherwise asks the
    /// summarizer for roughly 90% of `max_length`, rounded down to the
    /// nearest hundred characters; falls back to a hard truncation if the
    /// summary call fails, returns empty, or is still too long.
    pub async fn process_response(&self, original: &str, max_length: usize) -> String {
        if original.len() <= max_length {
            return original.to_string();
        }

        let target_length = ((max_length as f64 * 0.9) / 100.0).floor() as usize * 100;
        info!(
            original_length = original.len(),
            max_length, "response exceeds limit, attempting summarization"
        );

        match self.summarize(original, target_length).await {
            Some(summary) if summary.len() <= max_length => {
                info!(summarized_length = summary.len(), "summarization succeeded");
                summary
            }
            Some(summary) => {
                warn!(summarized_length = summary.len(), max_length, "summary still too long, truncating");
                truncate(original, max_length)
            }
            None => truncate(original, max_length),
        }
    }

    async fn summarize(&self, original: &str, target_length: usize) -> Option<String> {
        let req = ChatRequest::new(&self.model, summarize_prompt(target_length))
            .with_user_message("Please summarize the response provided in the system prompt.");
        let mut req = req;
        req.temperature = SUMMARIZATION_TEMPERATURE;

        let resp = match self.provider.send(&req).await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(err = %e, "summarization request failed");
                return None;
            }
        };

        let trimmed = resp.content.trim().to_string();
        if trimmed.is_empty() {
            warn!("summarizer returned an empty reply");
            return None;
        }
        Some(trimmed)
    }
}

fn truncate(response: &str, max_length: usize) -> String {
    if response.len() <= max_length {
        return response.to_string();
    }
    let cut = max_length.saturating_sub(3);
    let mut end = cut.min(response.len());
    while end > 0 && !response.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &response[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parley_providers::{ChatResponse, ProviderError};

    struct ScriptedProvider(Result<&'static str, &'static str>);

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }
        async fn send(&self, _req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
            match self.0 {
                Ok(content) => Ok(ChatResponse {
                    content: content.to_string(),
                    model: "m".into(),
                    tokens_in: 1,
                    tokens_out: 1,
                }),
                Err(msg) => Err(ProviderError::Unavailable(msg.to_string())),
            }
        }
    }

    #[tokio::test]
    async fn short_replies_pass_through_unchanged() {
        let processor = ResponsePostProcessor::new(Arc::new(ScriptedProvider(Ok("summary"))), "m");
        let reply = processor.process_response("short reply", 2000).await;
        assert_eq!(reply, "short reply");
    }

    #[tokio::test]
    async fn long_reply_is_summarized_when_the_summary_fits() {
        let long = "x".repeat(2500);
        let processor = ResponsePostProcessor::new(Arc::new(ScriptedProvider(Ok("a tidy summary"))), "m");
        let reply = processor.process_response(&long, 2000).await;
        assert_eq!(reply, "a tidy summary");
    }

    #[tokio::test]
    async fn provider_failure_falls_back_to_truncation() {
        let long = "y".repeat(2500);
        let processor = ResponsePostProcessor::new(Arc::new(ScriptedProvider(Err("down"))), "m");
        let reply = processor.process_response(&long, 2000).await;
        assert_eq!(reply.len(), 2000);
        assert!(reply.ends_with("..."));
    }

    #[tokio::test]
    async fn summary_still_too_long_falls_back_to_truncation() {
        let long = "z".repeat(2500);
        let still_long = "s".repeat(2100);
        let processor = ResponsePostProcessor::new(
            Arc::new(ScriptedProvider(Ok(Box::leak(still_long.into_boxed_str())))),
            "m",
        );
        let reply = processor.process_response(&long, 2000).await;
        assert_eq!(reply.len(), 2000);
        assert!(reply.ends_with("..."));
    }

    #[tokio::test]
    async fn empty_summary_falls_back_to_truncation() {
        let long = "w".repeat(2500);
        let processor = ResponsePostProcessor::new(Arc::new(ScriptedProvider(Ok("   "))), "m");
        let reply = processor.process_response(&long, 2000).await;
        assert_eq!(reply.len(), 2000);
        assert!(reply.ends_with("..."));
    }
}
