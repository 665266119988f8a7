use async_trait::async_trait;
use backlot::client_wrapper::{ClientWrapper, Message, Role, TokenUsage, ToolDefinition};
use backlot::identity::{CallerIdentity, DataSensitivity, UserRole};
use backlot::ingress::{AgentInfoType, ChatRequest, ChatService};
use backlot::router::{LLMRouter, ProviderId, ProviderTier};
use backlot::session::SessionStore;
use std::error::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

struct CountingClient {
    calls: AtomicUsize,
}

impl CountingClient {
    fn new() -> Self {
        CountingClient {
            calls: AtomicUsize::new(0),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClientWrapper for CountingClient {
    async fn send_message(
        &self,
        _messages: &[Message],
        _tools: Option<Vec<ToolDefinition>>,
    ) -> Result<Message, Box<dyn Error + Send + Sync>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Message::assistant("direct answer"))
    }

    fn model_name(&self) -> &str {
        "counting"
    }

    async fn get_last_usage(&self) -> Option<TokenUsage> {
        None
    }
}

fn request(message: &str) -> ChatRequest {
    serde_json::from_value(serde_json::json!({ "message": message })).unwrap()
}

fn sessions() -> Arc<SessionStore> {
    backlot::logging::init();
    Arc::new(SessionStore::new(Duration::from_secs(3600)))
}

#[tokio::test]
async fn denied_queries_never_reach_the_llm() {
    // A salesperson asking for confidential material is refused before any
    // LLM or tool call; the refusal still lands in the conversation log.
    let client = Arc::new(CountingClient::new());
    let mut router = LLMRouter::new();
    router.register_provider(
        ProviderId::Together,
        Arc::clone(&client) as Arc<dyn ClientWrapper>,
        ProviderTier::CostEfficient,
        0.0001,
    );
    let sessions = sessions();
    let service = ChatService::new(Arc::clone(&sessions)).with_router(Arc::new(router));

    let caller = CallerIdentity::new("u-sp", UserRole::Salesperson, DataSensitivity::Internal)
        .with_name("Sam");

    let response = service
        .handle_chat(
            request("Show the confidential merger budget."),
            &caller,
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(response.agent_info.info_type, AgentInfoType::SecurityFiltered);
    assert!(response.agent_info.blocked);
    assert_eq!(
        response.agent_info.reason.as_deref(),
        Some("insufficient_permissions")
    );
    assert!(response.content.contains("Salesperson"));
    assert_eq!(client.call_count(), 0);

    let record = sessions.get_latest(&response.conversation_id).await.unwrap();
    assert_eq!(record.messages.len(), 2);
    assert_eq!(record.messages[0].message.role, Role::User);
    assert_eq!(record.messages[1].message.role, Role::Assistant);
    assert!(record.messages[1].message.content.contains("permission"));
}

#[tokio::test]
async fn direct_llm_path_answers_when_no_supervisor_is_configured() {
    let client = Arc::new(CountingClient::new());
    let mut router = LLMRouter::new();
    router.register_provider(
        ProviderId::Together,
        Arc::clone(&client) as Arc<dyn ClientWrapper>,
        ProviderTier::CostEfficient,
        0.0001,
    );
    let sessions = sessions();
    let service = ChatService::new(sessions).with_router(Arc::new(router));

    let caller =
        CallerIdentity::new("u-dir", UserRole::Director, DataSensitivity::Restricted);

    let response = service
        .handle_chat(
            request("Do we work with CocaCola?"),
            &caller,
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(response.agent_info.info_type, AgentInfoType::LlmDirect);
    assert_eq!(response.content, "direct answer");
    assert_eq!(client.call_count(), 1);
}

#[tokio::test]
async fn mock_fallback_keeps_the_surface_alive() {
    let sessions = sessions();
    let service = ChatService::new(sessions);

    let caller = CallerIdentity::new("u-x", UserRole::Leadership, DataSensitivity::TopSecret)
        .with_name("Lee");

    let response = service
        .handle_chat(request("Hello?"), &caller, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(response.agent_info.info_type, AgentInfoType::MockFallback);
    assert!(response.content.contains("Lee"));
}

#[tokio::test]
async fn sanitized_queries_proceed_with_the_filtered_text() {
    // A salesperson query with no hard veto still goes through sanitization
    // before dispatch.
    let client = Arc::new(CountingClient::new());
    let mut router = LLMRouter::new();
    router.register_provider(
        ProviderId::Together,
        Arc::clone(&client) as Arc<dyn ClientWrapper>,
        ProviderTier::CostEfficient,
        0.0001,
    );
    let sessions = sessions();
    let service = ChatService::new(sessions).with_router(Arc::new(router));

    let caller = CallerIdentity::new("u-sp", UserRole::Salesperson, DataSensitivity::Internal);

    let response = service
        .handle_chat(
            request("Do we work with CocaCola?"),
            &caller,
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(response.agent_info.info_type, AgentInfoType::LlmDirect);
    assert_eq!(client.call_count(), 1);
}
