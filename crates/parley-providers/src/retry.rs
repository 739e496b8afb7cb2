use async_trait::async_trait;
use rand::Rng;
use std::time::{Duration, Instant};
use tracing::warn;

use crate::provider::{ChatRequest, ChatResponse, LlmProvider, ProviderError};

/// Bound on how long `RetryProvider` keeps trying. Exactly one of the two
/// is meaningful at a time, mirroring `backoff`'s `max_tries`/`max_time`
/// being mutually exclusive stop conditions.
#[derive(Debug, Clone, Copy)]
pub enum RetryBound {
    MaxTries(u32),
    MaxTime(Duration),
}

/// Exponential backoff with an optional full-jitter randomization, wrapping
/// one provider. `Blocked` is never retried — it is a non-result no amount
/// of retrying will fix.
pub struct RetryProvider {
    inner: Box<dyn LlmProvider>,
    bound: RetryBound,
    base_delay: Duration,
    max_delay: Duration,
    full_jitter: bool,
}

impl RetryProvider {
    pub fn new(inner: Box<dyn LlmProvider>, bound: RetryBound) -> Self {
        Self {
            inner,
            bound,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            full_jitter: true,
        }
    }

    pub fn without_jitter(mut self) -> Self {
        self.full_jitter = false;
        self
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = self.base_delay.saturating_mul(1u32 << attempt.min(16));
        let capped = exp.min(self.max_delay);
        if self.full_jitter {
            let millis = capped.as_millis().max(1) as u64;
            let jittered = rand::rng().random_range(0..=millis);
            Duration::from_millis(jittered)
        } else {
            capped
        }
    }
}

#[async_trait]
impl LlmProvider for RetryProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let started = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            match self.inner.send(req).await {
                Ok(resp) => return Ok(resp),
                Err(e) if e.is_blocked() => return Err(e),
                Err(e) => {
                    let exhausted = match self.bound {
                        RetryBound::MaxTries(max) => attempt + 1 >= max,
                        RetryBound::MaxTime(max_time) => started.elapsed() >= max_time,
                    };
                    if exhausted {
                        return Err(e);
                    }
                    warn!(
                        provider = self.inner.name(),
                        attempt, err = %e, "retrying after provider error"
                    );
                    tokio::time::sleep(self.backoff_delay(attempt)).await;
                    attempt += 1;
                }
            }
        }
    }

    fn supports_native_schema(&self) -> bool {
        self.inner.supports_native_schema()
    }

    fn supports_grounding(&self) -> bool {
        self.inner.supports_grounding()
    }

    fn supports_images(&self) -> bool {
        self.inner.supports_images()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ChatRequest, ChatResponse};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct CountingFail {
        calls: Arc<AtomicU32>,
        blocked: bool,
    }

    #[async_trait]
    impl LlmProvider for CountingFail {
        fn name(&self) -> &str {
            "counting-fail"
        }
        async fn send(&self, _req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.blocked {
                Err(ProviderError::Blocked("policy".into()))
            } else {
                Err(ProviderError::Unavailable("down".into()))
            }
        }
    }

    fn dummy_request() -> ChatRequest {
        ChatRequest::new("test-model", "system").with_user_message("hello")
    }

    #[tokio::test]
    async fn blocked_is_never_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let provider = RetryProvider::new(
            Box::new(CountingFail {
                calls: calls.clone(),
                blocked: true,
            }),
            RetryBound::MaxTries(5),
        )
        .without_jitter();

        let result = provider.send(&dummy_request()).await;
        assert!(matches!(result, Err(ProviderError::Blocked(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn other_errors_retried_up_to_max_tries() {
        let calls = Arc::new(AtomicU32::new(0));
        let provider = RetryProvider::new(
            Box::new(CountingFail {
                calls: calls.clone(),
                blocked: false,
            }),
            RetryBound::MaxTries(3),
        )
        .without_jitter();
        let provider = {
            // shrink delays for the test
            let mut p = provider;
            p.base_delay = Duration::from_millis(1);
            p.max_delay = Duration::from_millis(2);
            p
        };

        let result = provider.send(&dummy_request()).await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn max_time_bounds_wall_clock() {
        let calls = Arc::new(AtomicU32::new(0));
        let mut provider = RetryProvider::new(
            Box::new(CountingFail {
                calls: calls.clone(),
                blocked: false,
            }),
            RetryBound::MaxTime(Duration::from_millis(50)),
        )
        .without_jitter();
        provider.base_delay = Duration::from_millis(10);
        provider.max_delay = Duration::from_millis(10);

        let started = Instant::now();
        let result = provider.send(&dummy_request()).await;
        assert!(result.is_err());
        assert!(started.elapsed() < Duration::from_millis(200));
    }
}
