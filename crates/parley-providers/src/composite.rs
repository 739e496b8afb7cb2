use async_trait::async_trait;
use rand::seq::SliceRandom;
use tracing::{info, warn};

use crate::provider::{ChatRequest, ChatResponse, LlmProvider, ProviderError};

/// Predicate applied to an otherwise-successful reply. When it returns
/// `true` the composite treats the reply as a non-result and falls back to
/// the next provider — this is how the router escalates a `NOTSURE` route
/// selection to a stronger model.
pub type BadResponsePredicate = Box<dyn Fn(&ChatResponse) -> bool + Send + Sync>;

/// Wraps an ordered list of providers and tries them in sequence, optionally
/// shuffling the order per call and skipping replies a predicate flags as
/// unusable.
pub struct CompositeProvider {
    providers: Vec<Box<dyn LlmProvider>>,
    shuffle: bool,
    is_bad_response: Option<BadResponsePredicate>,
}

impl CompositeProvider {
    pub fn new(providers: Vec<Box<dyn LlmProvider>>) -> Self {
        assert!(
            !providers.is_empty(),
            "CompositeProvider requires at least one provider"
        );
        Self {
            providers,
            shuffle: false,
            is_bad_response: None,
        }
    }

    pub fn shuffled(mut self) -> Self {
        self.shuffle = true;
        self
    }

    pub fn with_bad_response_predicate(
        mut self,
        predicate: impl Fn(&ChatResponse) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.is_bad_response = Some(Box::new(predicate));
        self
    }

    fn order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.providers.len()).collect();
        if self.shuffle {
            order.shuffle(&mut rand::rng());
        }
        order
    }
}

#[async_trait]
impl LlmProvider for CompositeProvider {
    fn name(&self) -> &str {
        "composite"
    }

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let order = self.order();
        let mut last_err: Option<ProviderError> = None;

        for (position, idx) in order.into_iter().enumerate() {
            let provider = &self.providers[idx];
            match provider.send(req).await {
                Ok(resp) => {
                    let bad = self
                        .is_bad_response
                        .as_ref()
                        .map(|pred| pred(&resp))
                        .unwrap_or(false);
                    if bad {
                        warn!(
                            provider = provider.name(),
                            position, "bad response, falling back"
                        );
                        last_err = Some(ProviderError::Unavailable(format!(
                            "{} returned a bad response",
                            provider.name()
                        )));
                        continue;
                    }
                    info!(provider = provider.name(), position, "composite succeeded");
                    return Ok(resp);
                }
                Err(e) => {
                    warn!(provider = provider.name(), position, err = %e, "provider failed");
                    last_err = Some(e);
                }
            }
        }

        Err(ProviderError::Composite(
            last_err
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no providers configured".to_string()),
        ))
    }

    fn supports_native_schema(&self) -> bool {
        self.providers.iter().all(|p| p.supports_native_schema())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ChatRequest;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    struct Scripted {
        label: &'static str,
        result: Result<ChatResponse, ProviderError>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl LlmProvider for Scripted {
        fn name(&self) -> &str {
            self.label
        }
        async fn send(&self, _req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.result {
                Ok(r) => Ok(r.clone()),
                Err(e) => Err(clone_err(e)),
            }
        }
    }

    fn clone_err(e: &ProviderError) -> ProviderError {
        match e {
            ProviderError::Unavailable(s) => ProviderError::Unavailable(s.clone()),
            other => ProviderError::Unavailable(other.to_string()),
        }
    }

    fn resp(content: &str) -> ChatResponse {
        ChatResponse {
            content: content.to_string(),
            model: "m".to_string(),
            tokens_in: 1,
            tokens_out: 1,
        }
    }

    fn dummy_request() -> ChatRequest {
        ChatRequest::new("test-model", "system").with_user_message("hello")
    }

    #[tokio::test]
    async fn bad_response_falls_back_and_calls_both() {
        let calls_a = Arc::new(AtomicUsize::new(0));
        let calls_b = Arc::new(AtomicUsize::new(0));

        let composite = CompositeProvider::new(vec![
            Box::new(Scripted {
                label: "a",
                result: Ok(resp("NOTSURE")),
                calls: calls_a.clone(),
            }),
            Box::new(Scripted {
                label: "b",
                result: Ok(resp("GENERAL")),
                calls: calls_b.clone(),
            }),
        ])
        .with_bad_response_predicate(|r| r.content == "NOTSURE");

        let result = composite.send(&dummy_request()).await.unwrap();
        assert_eq!(result.content, "GENERAL");
        assert_eq!(calls_a.load(Ordering::SeqCst), 1);
        assert_eq!(calls_b.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn all_failing_returns_composite_error() {
        let calls = Arc::new(AtomicUsize::new(0));
        let composite = CompositeProvider::new(vec![
            Box::new(Scripted {
                label: "a",
                result: Err(ProviderError::Unavailable("down".into())),
                calls: calls.clone(),
            }),
            Box::new(Scripted {
                label: "b",
                result: Err(ProviderError::Unavailable("down".into())),
                calls: calls.clone(),
            }),
        ]);

        let result = composite.send(&dummy_request()).await;
        assert!(matches!(result, Err(ProviderError::Composite(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn shuffle_distributes_first_try_roughly_uniformly() {
        let n = 4usize;
        let trials = 12_000;
        let wins: Arc<Mutex<HashMap<&'static str, u32>>> = Arc::new(Mutex::new(HashMap::new()));
        let labels = ["p0", "p1", "p2", "p3"];

        for _ in 0..trials {
            let calls: Vec<_> = (0..n).map(|_| Arc::new(AtomicUsize::new(0))).collect();
            let providers: Vec<Box<dyn LlmProvider>> = (0..n)
                .map(|i| {
                    Box::new(Scripted {
                        label: labels[i],
                        result: Ok(resp(labels[i])),
                        calls: calls[i].clone(),
                    }) as Box<dyn LlmProvider>
                })
                .collect();
            let composite = CompositeProvider::new(providers).shuffled();
            let result = composite.send(&dummy_request()).await.unwrap();
            *wins.lock().unwrap().entry(
                labels.iter().find(|&&l| l == result.content).unwrap(),
            )
            .or_insert(0) += 1;
        }

        let wins = wins.lock().unwrap();
        let expected = trials as f64 / n as f64;
        for label in labels {
            let count = *wins.get(label).unwrap_or(&0) as f64;
            assert!(
                (count - expected).abs() / expected < 0.15,
                "label {label} got {count}, expected ~{expected}"
            );
        }
    }
}
