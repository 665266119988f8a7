use async_trait::async_trait;
use backlot::agents::{AnalyticsBehavior, SalesBehavior, TalentBehavior};
use backlot::client_wrapper::{ClientWrapper, Message, TokenUsage, ToolDefinition};
use backlot::conversation::{Agent, AgentKind};
use backlot::identity::{CallerIdentity, DataSensitivity, UserRole};
use backlot::prompts::PromptTemplateRegistry;
use backlot::router::{LLMRouter, ProviderId, ProviderTier};
use backlot::session::SessionStore;
use backlot::supervisor::{RoutingStrategy, Supervisor};
use backlot::tool_protocol::ToolRegistry;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Answers every completion with a fixed line, optionally after a delay.
struct FixedClient {
    response: String,
    delay: Duration,
}

impl FixedClient {
    fn new(response: &str) -> Self {
        FixedClient {
            response: response.to_string(),
            delay: Duration::from_millis(0),
        }
    }

    fn slow(response: &str, delay: Duration) -> Self {
        FixedClient {
            response: response.to_string(),
            delay,
        }
    }
}

#[async_trait]
impl ClientWrapper for FixedClient {
    async fn send_message(
        &self,
        _messages: &[Message],
        _tools: Option<Vec<ToolDefinition>>,
    ) -> Result<Message, Box<dyn Error + Send + Sync>> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(Message::assistant(&self.response))
    }

    fn model_name(&self) -> &str {
        "fixed"
    }

    async fn get_last_usage(&self) -> Option<TokenUsage> {
        None
    }
}

struct AlwaysFailingClient;

#[async_trait]
impl ClientWrapper for AlwaysFailingClient {
    async fn send_message(
        &self,
        _messages: &[Message],
        _tools: Option<Vec<ToolDefinition>>,
    ) -> Result<Message, Box<dyn Error + Send + Sync>> {
        Err("provider down".into())
    }

    fn model_name(&self) -> &str {
        "broken"
    }

    async fn get_last_usage(&self) -> Option<TokenUsage> {
        None
    }
}

fn build_supervisor(client: Arc<dyn ClientWrapper>) -> (Supervisor, Arc<SessionStore>) {
    backlot::logging::init();
    let mut router = LLMRouter::new();
    router.register_provider(ProviderId::Together, Arc::clone(&client), ProviderTier::CostEfficient, 0.0001);
    router.register_provider(ProviderId::OpenAI, client, ProviderTier::HighQuality, 0.0005);
    let router = Arc::new(router);

    let registry = Arc::new(ToolRegistry::new());
    let sessions = Arc::new(SessionStore::new(Duration::from_secs(3600)));
    let prompts = Arc::new(PromptTemplateRegistry::new());

    let mut supervisor = Supervisor::new(
        Arc::clone(&router),
        Arc::clone(&sessions),
        Arc::clone(&registry),
    );
    let behaviors: Vec<Box<dyn backlot::conversation::AgentBehavior>> = vec![
        Box::new(SalesBehavior),
        Box::new(TalentBehavior),
        Box::new(AnalyticsBehavior),
    ];
    for behavior in behaviors {
        supervisor.add_agent(Agent::new(
            behavior,
            Arc::clone(&router),
            Arc::clone(&registry),
            Arc::clone(&prompts),
            Arc::clone(&sessions),
        ));
    }

    (supervisor, sessions)
}

fn leadership() -> CallerIdentity {
    CallerIdentity::new("u-lead", UserRole::Leadership, DataSensitivity::TopSecret)
}

#[test]
fn ambiguous_queries_default_to_sales() {
    let (supervisor, _) = build_supervisor(Arc::new(FixedClient::new("ok")));
    let decision = supervisor.classify_query("Do we work with CocaCola?");
    assert_eq!(decision.strategy, RoutingStrategy::SingleAgent);
    assert_eq!(decision.primary, AgentKind::Sales);
}

#[test]
fn multi_domain_queries_route_multi_agent() {
    let (supervisor, _) = build_supervisor(Arc::new(FixedClient::new("ok")));
    let decision = supervisor.classify_query(
        "Compare sales revenue and pricing trends, then hire talent and crew for the team",
    );
    assert_eq!(decision.strategy, RoutingStrategy::MultiAgent);
    assert_eq!(decision.participants.len(), 3);
    // Talent matched the larger share of its keyword set.
    assert_eq!(decision.primary, AgentKind::Talent);
}

#[test]
fn confident_single_domain_routes_to_it() {
    let (supervisor, _) = build_supervisor(Arc::new(FixedClient::new("ok")));
    let supervisor = supervisor.with_confidence_threshold(0.3);
    let decision = supervisor.classify_query("hire crew talent");
    assert_eq!(decision.strategy, RoutingStrategy::SingleAgent);
    assert_eq!(decision.primary, AgentKind::Talent);
}

#[tokio::test]
async fn preferred_agent_overrides_classification() {
    let (supervisor, _) = build_supervisor(Arc::new(FixedClient::new("analytics view")));
    let response = supervisor
        .route_query(
            "Do we work with CocaCola?",
            &leadership(),
            Some(AgentKind::Analytics),
            None,
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(response.agent_type, "analytics");
    assert_eq!(response.routing.agents_used, vec!["analytics"]);
}

#[tokio::test]
async fn multi_agent_run_synthesizes_one_canonical_reply() {
    // All agents contribute, synthesis produces one assistant
    // message in the canonical log, scoped logs exist per agent.
    let (supervisor, sessions) = build_supervisor(Arc::new(FixedClient::new("insight")));

    let response = supervisor
        .route_query(
            "Compare sales revenue and pricing trends, then hire talent and crew for the team",
            &leadership(),
            None,
            Some("conv-m"),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(response.agent_type, "orchestrator");
    assert_eq!(response.routing.strategy, RoutingStrategy::MultiAgent);
    assert_eq!(response.routing.agents_used.len(), 3);
    assert!(!response.content.is_empty());

    let canonical = sessions.get_latest("conv-m").await.unwrap();
    let assistant_count = canonical
        .messages
        .iter()
        .filter(|m| m.message.role == backlot::client_wrapper::Role::Assistant)
        .count();
    assert_eq!(assistant_count, 1);

    for kind in ["sales", "talent", "analytics"] {
        let scoped = sessions.get_latest(&format!("conv-m_{}", kind)).await;
        assert!(scoped.is_some(), "missing scoped conversation for {}", kind);
    }
}

#[tokio::test]
async fn synthesis_failure_concatenates_with_headers() {
    // Agents answer, then every further completion fails: the reply falls
    // back to labeled concatenation.
    struct FlakyClient {
        successes_left: tokio::sync::Mutex<usize>,
    }

    #[async_trait]
    impl ClientWrapper for FlakyClient {
        async fn send_message(
            &self,
            _messages: &[Message],
            _tools: Option<Vec<ToolDefinition>>,
        ) -> Result<Message, Box<dyn Error + Send + Sync>> {
            let mut left = self.successes_left.lock().await;
            if *left > 0 {
                *left -= 1;
                Ok(Message::assistant("agent insight"))
            } else {
                Err("synthesis window closed".into())
            }
        }

        fn model_name(&self) -> &str {
            "flaky"
        }

        async fn get_last_usage(&self) -> Option<TokenUsage> {
            None
        }
    }

    let client = Arc::new(FlakyClient {
        successes_left: tokio::sync::Mutex::new(3),
    });
    let (supervisor, _) = build_supervisor(client);

    let response = supervisor
        .route_query(
            "Compare sales revenue and pricing trends, then hire talent and crew for the team",
            &leadership(),
            None,
            Some("conv-f"),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(response.content.contains("Perspective:**"));
    assert!(response.content.contains("agent insight"));
}

#[tokio::test]
async fn zero_agent_successes_fall_back_to_sales() {
    // With every provider broken the fan-out yields nothing and the fallback
    // Sales run also errors, which surfaces as a supervisor error.
    let (supervisor, _) = build_supervisor(Arc::new(AlwaysFailingClient));

    let result = supervisor
        .route_query(
            "Compare sales revenue and pricing trends, then hire talent and crew for the team",
            &leadership(),
            None,
            Some("conv-z"),
            CancellationToken::new(),
        )
        .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn cancellation_propagates_to_all_agents() {
    // The client disconnects mid-fan-out; no canonical assistant message
    // is persisted.
    let (supervisor, sessions) = build_supervisor(Arc::new(FixedClient::slow(
        "too late",
        Duration::from_secs(5),
    )));

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel_clone.cancel();
    });

    let result = supervisor
        .route_query(
            "Compare sales revenue and pricing trends, then hire talent and crew for the team",
            &leadership(),
            None,
            Some("conv-s6"),
            cancel,
        )
        .await;

    assert!(result.is_err());

    // Scoped logs end with the user message only; the canonical log has no
    // assistant message.
    for kind in ["sales", "talent", "analytics"] {
        if let Some(record) = sessions.get_latest(&format!("conv-s6_{}", kind)).await {
            assert!(record
                .messages
                .iter()
                .all(|m| m.message.role == backlot::client_wrapper::Role::User));
        }
    }
    if let Some(canonical) = sessions.get_latest("conv-s6").await {
        assert!(canonical
            .messages
            .iter()
            .all(|m| m.message.role != backlot::client_wrapper::Role::Assistant));
    }
}

#[tokio::test]
async fn status_reports_all_subsystems() {
    let (supervisor, _) = build_supervisor(Arc::new(FixedClient::new("ok")));
    let status = supervisor.status().await;

    assert_eq!(status["orchestrator_status"], "healthy");
    assert!(status["agents"]["sales"].is_object());
    assert!(status["providers"]["together"].is_object());
    assert!(status["tools"]["tool_count"].is_number());
    assert!(status["sessions"]["active_conversations"].is_number());
}
