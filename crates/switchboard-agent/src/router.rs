use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::provider::{ChatRequest, ChatResponse, LlmProvider, ProviderError};

/// One provider in the failover order.
pub struct ProviderSlot {
    pub provider: Box<dyn LlmProvider>,
    /// Extra attempts on this provider before moving on.
    pub max_retries: u32,
}

impl ProviderSlot {
    pub fn new(provider: Box<dyn LlmProvider>, max_retries: u32) -> Self {
        Self {
            provider,
            max_retries,
        }
    }

    /// Run the request against this provider, retrying with a short linear
    /// back-off. Rate limits and oversized input are not retried here.
    async fn attempt(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let name = self.provider.name();
        let mut attempt = 0;
        loop {
            let err = match self.provider.send(req).await {
                Ok(resp) => {
                    if attempt > 0 {
                        info!(provider = %name, attempt, "provider answered after retry");
                    }
                    return Ok(resp);
                }
                Err(e) => e,
            };
            warn!(provider = %name, attempt, err = %err, "provider send failed");

            let retriable = !err.is_context_overflow()
                && !matches!(err, ProviderError::RateLimited { .. });
            if !retriable || attempt >= self.max_retries {
                return Err(err);
            }
            attempt += 1;
            tokio::time::sleep(Duration::from_millis(200 * attempt as u64)).await;
        }
    }
}

/// Failover across LLM providers in priority order.
///
/// A provider that keeps failing hands over to the next one. Oversized
/// input ends the walk at once since every provider would reject it.
pub struct ProviderRouter {
    slots: Vec<ProviderSlot>,
}

impl ProviderRouter {
    pub fn new(slots: Vec<ProviderSlot>) -> Self {
        Self { slots }
    }
}

#[async_trait]
impl LlmProvider for ProviderRouter {
    fn name(&self) -> &str {
        "router"
    }

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let mut last_err = None;
        for (i, slot) in self.slots.iter().enumerate() {
            match slot.attempt(req).await {
                Ok(resp) => return Ok(resp),
                Err(e) if e.is_context_overflow() => return Err(e),
                Err(e) => {
                    if i + 1 < self.slots.len() {
                        info!(provider = %slot.provider.name(), "falling over to next provider");
                    }
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| ProviderError::Unavailable("no providers configured".into())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ChatRequest, ChatResponse, Message};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Fails with whatever its builder returns, counting calls.
    struct Failing(Arc<AtomicU32>, fn() -> ProviderError);

    #[async_trait]
    impl LlmProvider for Failing {
        fn name(&self) -> &str {
            "failing"
        }
        async fn send(&self, _req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err((self.1)())
        }
    }

    fn down() -> ProviderError {
        ProviderError::Unavailable("connection refused".into())
    }

    fn limited() -> ProviderError {
        ProviderError::RateLimited { retry_after_ms: 1000 }
    }

    fn too_large() -> ProviderError {
        ProviderError::Api {
            status: 413,
            message: "request too large".into(),
        }
    }

    fn counter() -> Arc<AtomicU32> {
        Arc::new(AtomicU32::new(0))
    }

    struct AlwaysOk;

    #[async_trait]
    impl LlmProvider for AlwaysOk {
        fn name(&self) -> &str {
            "always-ok"
        }
        async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
            Ok(ChatResponse {
                content: "ok".to_string(),
                model: req.model.clone(),
                tokens_in: 1,
                tokens_out: 1,
                stop_reason: "stop".to_string(),
            })
        }
    }

    fn dummy_request() -> ChatRequest {
        ChatRequest {
            model: "test-model".to_string(),
            system: "You are a test.".to_string(),
            messages: vec![Message::user("hello")],
            max_tokens: 64,
        }
    }

    #[tokio::test]
    async fn falls_over_to_next_provider() {
        let router = ProviderRouter::new(vec![
            ProviderSlot::new(Box::new(Failing(counter(), down)), 0),
            ProviderSlot::new(Box::new(AlwaysOk), 0),
        ]);
        let resp = router.send(&dummy_request()).await.unwrap();
        assert_eq!(resp.content, "ok");
    }

    #[tokio::test]
    async fn retries_before_falling_over() {
        let calls = counter();
        let router = ProviderRouter::new(vec![
            ProviderSlot::new(Box::new(Failing(Arc::clone(&calls), down)), 2),
            ProviderSlot::new(Box::new(AlwaysOk), 0),
        ]);
        assert!(router.send(&dummy_request()).await.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn rate_limit_skips_retries() {
        let calls = counter();
        let router = ProviderRouter::new(vec![
            ProviderSlot::new(Box::new(Failing(Arc::clone(&calls), limited)), 3),
            ProviderSlot::new(Box::new(AlwaysOk), 0),
        ]);
        assert!(router.send(&dummy_request()).await.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn last_error_when_all_fail() {
        let router = ProviderRouter::new(vec![
            ProviderSlot::new(Box::new(Failing(counter(), down)), 0),
            ProviderSlot::new(Box::new(Failing(counter(), limited)), 0),
        ]);
        let err = router.send(&dummy_request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::RateLimited { .. }));
    }

    #[tokio::test]
    async fn empty_router_is_unavailable() {
        let err = ProviderRouter::new(Vec::new())
            .send(&dummy_request())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Unavailable(_)));
    }

    #[tokio::test]
    async fn oversized_input_stops_the_walk() {
        let (first, second) = (counter(), counter());
        let router = ProviderRouter::new(vec![
            ProviderSlot::new(Box::new(Failing(Arc::clone(&first), too_large)), 2),
            ProviderSlot::new(Box::new(Failing(Arc::clone(&second), down)), 0),
        ]);
        let err = router.send(&dummy_request()).await.unwrap_err();
        assert!(err.is_context_overflow());
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 0);
    }
}
