use async_trait::async_trait;
use backlot::client_wrapper::{ClientWrapper, Message, TokenUsage, ToolDefinition};
use backlot::router::{
    LLMRouter, LlmRequest, ProviderId, ProviderTier, QueryComplexity, RouterError,
};
use std::error::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Scripted mock provider: fails the first `fail_first` calls, then answers.
struct MockClient {
    name: String,
    response: String,
    fail_first: Mutex<usize>,
    calls: AtomicUsize,
    tokens: usize,
}

impl MockClient {
    fn new(name: &str, response: &str) -> Self {
        MockClient {
            name: name.to_string(),
            response: response.to_string(),
            fail_first: Mutex::new(0),
            calls: AtomicUsize::new(0),
            tokens: 100,
        }
    }

    fn failing(name: &str, response: &str, fail_first: usize) -> Self {
        MockClient {
            fail_first: Mutex::new(fail_first),
            ..MockClient::new(name, response)
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClientWrapper for MockClient {
    async fn send_message(
        &self,
        _messages: &[Message],
        _tools: Option<Vec<ToolDefinition>>,
    ) -> Result<Message, Box<dyn Error + Send + Sync>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut remaining = self.fail_first.lock().await;
        if *remaining > 0 {
            *remaining -= 1;
            return Err("503 service unavailable".into());
        }
        Ok(Message::assistant(&self.response))
    }

    fn model_name(&self) -> &str {
        &self.name
    }

    async fn get_last_usage(&self) -> Option<TokenUsage> {
        Some(TokenUsage {
            input_tokens: self.tokens / 2,
            output_tokens: self.tokens / 2,
            total_tokens: self.tokens,
        })
    }
}

fn router_with(
    together: Arc<MockClient>,
    openai: Option<Arc<MockClient>>,
) -> LLMRouter {
    backlot::logging::init();
    let mut router = LLMRouter::new();
    router.register_provider(
        ProviderId::Together,
        together,
        ProviderTier::CostEfficient,
        0.0001,
    );
    if let Some(openai) = openai {
        router.register_provider(ProviderId::OpenAI, openai, ProviderTier::HighQuality, 0.0005);
    }
    router
}

#[tokio::test]
async fn empty_table_fails_with_no_providers() {
    let router = LLMRouter::new();
    let err = router
        .route_query(LlmRequest::from_messages(vec![Message::user("hi")]))
        .await
        .unwrap_err();
    assert!(matches!(err, RouterError::NoProvidersAvailable));
}

#[tokio::test]
async fn simple_queries_go_to_the_cost_efficient_default() {
    let together = Arc::new(MockClient::new("llama", "cheap answer"));
    let openai = Arc::new(MockClient::new("gpt", "expensive answer"));
    let router = router_with(Arc::clone(&together), Some(Arc::clone(&openai)));

    let response = router
        .route_query(LlmRequest::from_messages(vec![Message::user(
            "Do we work with CocaCola?",
        )]))
        .await
        .unwrap();

    assert_eq!(response.provider, ProviderId::Together);
    assert_eq!(together.call_count(), 1);
    assert_eq!(openai.call_count(), 0);
}

#[tokio::test]
async fn complex_queries_select_the_high_quality_provider() {
    // A complex query with a registered high-quality tier goes there first.
    let together = Arc::new(MockClient::new("llama", "cheap"));
    let openai = Arc::new(MockClient::new("gpt", "smart"));
    let router = router_with(Arc::clone(&together), Some(Arc::clone(&openai)));

    let response = router
        .route_query(
            LlmRequest::from_messages(vec![Message::user("hi")])
                .with_complexity(QueryComplexity::Complex),
        )
        .await
        .unwrap();

    assert_eq!(response.provider, ProviderId::OpenAI);
    assert_eq!(openai.call_count(), 1);
    assert_eq!(together.call_count(), 0);
}

#[tokio::test]
async fn preferred_provider_wins_when_registered() {
    let together = Arc::new(MockClient::new("llama", "a"));
    let openai = Arc::new(MockClient::new("gpt", "b"));
    let router = router_with(Arc::clone(&together), Some(Arc::clone(&openai)));

    let response = router
        .route_query(
            LlmRequest::from_messages(vec![Message::user("hi")])
                .with_preferred_provider(ProviderId::OpenAI),
        )
        .await
        .unwrap();

    assert_eq!(response.provider, ProviderId::OpenAI);
}

#[tokio::test]
async fn primary_failure_falls_back_exactly_once() {
    // One retry against the static fallback; provenance names the fallback.
    let together = Arc::new(MockClient::failing("llama", "never", 1));
    let openai = Arc::new(MockClient::new("gpt", "fallback answer"));
    let router = router_with(Arc::clone(&together), Some(Arc::clone(&openai)));

    let response = router
        .route_query(LlmRequest::from_messages(vec![Message::user(
            "Summarize our relationship with Disney.",
        )]))
        .await
        .unwrap();

    assert_eq!(response.provider, ProviderId::OpenAI);
    assert_eq!(response.message.content.as_ref(), "fallback answer");
    assert_eq!(together.call_count(), 1);
    assert_eq!(openai.call_count(), 1);

    let stats = router.provider_stats();
    assert_eq!(stats[&ProviderId::Together].requests, 1);
    assert_eq!(stats[&ProviderId::Together].failures, 1);
    assert_eq!(stats[&ProviderId::OpenAI].requests, 1);
    assert_eq!(stats[&ProviderId::OpenAI].failures, 0);
}

#[tokio::test]
async fn both_failing_surfaces_both_errors() {
    let together = Arc::new(MockClient::failing("llama", "x", 10));
    let openai = Arc::new(MockClient::failing("gpt", "y", 10));
    let router = router_with(Arc::clone(&together), Some(Arc::clone(&openai)));

    let err = router
        .route_query(LlmRequest::from_messages(vec![Message::user("hi")]))
        .await
        .unwrap_err();

    match err {
        RouterError::AllProvidersFailed { primary, fallback } => {
            assert_eq!(primary.0, ProviderId::Together);
            let (fallback_id, _) = fallback.expect("fallback attempt recorded");
            assert_eq!(fallback_id, ProviderId::OpenAI);
        }
        other => panic!("unexpected error: {:?}", other),
    }

    // Exactly one retry beyond the primary.
    assert_eq!(together.call_count(), 1);
    assert_eq!(openai.call_count(), 1);
}

#[tokio::test]
async fn no_registered_fallback_fails_without_retry() {
    let together = Arc::new(MockClient::failing("llama", "x", 10));
    let router = router_with(Arc::clone(&together), None);

    let err = router
        .route_query(LlmRequest::from_messages(vec![Message::user("hi")]))
        .await
        .unwrap_err();

    match err {
        RouterError::AllProvidersFailed { fallback, .. } => assert!(fallback.is_none()),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(together.call_count(), 1);
}

#[tokio::test]
async fn stats_count_every_attempt_exactly_once() {
    // `requests` increments once per attempt, success or failure.
    let together = Arc::new(MockClient::new("llama", "ok"));
    let router = router_with(Arc::clone(&together), None);

    for _ in 0..3 {
        router
            .route_query(LlmRequest::from_messages(vec![Message::user("hi")]))
            .await
            .unwrap();
    }

    let stats = router.provider_stats();
    assert_eq!(stats[&ProviderId::Together].requests, 3);
    assert_eq!(stats[&ProviderId::Together].failures, 0);
    assert!(stats[&ProviderId::Together].success_rate > 0.99);
    // The running mean over successful calls is populated.
    assert!(stats[&ProviderId::Together].avg_latency_ms >= 0.0);
}

#[tokio::test]
async fn cost_estimate_multiplies_tokens_by_rate() {
    let together = Arc::new(MockClient::new("llama", "ok"));
    let router = router_with(together, None);

    let response = router
        .route_query(LlmRequest::from_messages(vec![Message::user("hi")]))
        .await
        .unwrap();

    // 100 tokens * 0.0001 per token
    assert!((response.cost_estimate - 0.01).abs() < 1e-9);
}

#[tokio::test]
async fn embeddings_require_a_capable_provider() {
    let together = Arc::new(MockClient::new("llama", "ok"));
    let router = router_with(together, None);

    let err = router.embed("some text").await.unwrap_err();
    assert!(matches!(err, RouterError::EmbeddingUnavailable));
}
