use async_trait::async_trait;
use backlot::agents::SalesBehavior;
use backlot::client_wrapper::{
    ClientWrapper, Message, NativeToolCall, Role, TokenUsage, ToolDefinition,
};
use backlot::conversation::{Agent, ProcessingError};
use backlot::graph::{GraphClient, GraphError};
use backlot::graph_tools::{register_graph_tools, GraphToolSet};
use backlot::identity::{CallerIdentity, DataSensitivity, UserRole};
use backlot::memory::{
    InMemoryMemoryStore, MemoryKind, MemoryManager, MemoryStore, MemoryVariant,
};
use backlot::prompts::PromptTemplateRegistry;
use backlot::router::{LLMRouter, ProviderId, ProviderTier};
use backlot::session::SessionStore;
use backlot::tool_protocol::ToolRegistry;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::error::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Pops scripted responses in order; answers with a canned line once empty.
struct ScriptedClient {
    script: Mutex<VecDeque<Message>>,
    calls: AtomicUsize,
}

impl ScriptedClient {
    fn new(script: Vec<Message>) -> Self {
        ScriptedClient {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClientWrapper for ScriptedClient {
    async fn send_message(
        &self,
        _messages: &[Message],
        _tools: Option<Vec<ToolDefinition>>,
    ) -> Result<Message, Box<dyn Error + Send + Sync>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .script
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Message::assistant("scripted fallback")))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn get_last_usage(&self) -> Option<TokenUsage> {
        None
    }
}

struct MockGraph {
    rows: Vec<Value>,
}

#[async_trait]
impl GraphClient for MockGraph {
    async fn run(&self, _query: &str, _params: Value) -> Result<Vec<Value>, GraphError> {
        Ok(self.rows.clone())
    }
}

fn tool_call_message(tool: &str, args: Value) -> Message {
    Message {
        role: Role::Assistant,
        content: Arc::from(""),
        tool_calls: vec![NativeToolCall {
            id: "call_1".to_string(),
            name: tool.to_string(),
            arguments: args,
        }],
    }
}

struct Fixture {
    agent: Agent,
    sessions: Arc<SessionStore>,
    memory_store: Arc<InMemoryMemoryStore>,
    client: Arc<ScriptedClient>,
}

fn fixture(script: Vec<Message>, graph_rows: Vec<Value>) -> Fixture {
    backlot::logging::init();
    let client = Arc::new(ScriptedClient::new(script));

    let mut router = LLMRouter::new();
    router.register_provider(
        ProviderId::Together,
        Arc::clone(&client) as Arc<dyn ClientWrapper>,
        ProviderTier::CostEfficient,
        0.0001,
    );
    let router = Arc::new(router);

    let mut registry = ToolRegistry::new();
    let tools = Arc::new(GraphToolSet::new(Arc::new(MockGraph { rows: graph_rows })));
    register_graph_tools(&mut registry, tools);
    let registry = Arc::new(registry);

    let sessions = Arc::new(SessionStore::new(Duration::from_secs(3600)));
    let memory_store = Arc::new(InMemoryMemoryStore::new());
    let memory = Arc::new(MemoryManager::new(
        Arc::clone(&memory_store) as Arc<dyn MemoryStore>,
        Arc::clone(&router),
    ));

    let agent = Agent::new(
        Box::new(SalesBehavior),
        Arc::clone(&router),
        registry,
        Arc::new(PromptTemplateRegistry::new()),
        Arc::clone(&sessions),
    )
    .with_memory(memory);

    Fixture {
        agent,
        sessions,
        memory_store,
        client,
    }
}

fn director() -> CallerIdentity {
    CallerIdentity::new("u-dir", UserRole::Director, DataSensitivity::Restricted)
        .with_name("Dana")
}

#[tokio::test]
async fn tool_calling_turn_executes_and_synthesizes() {
    // One tool call, then a synthesis completion.
    let org_row = json!({
        "organization": {"name": "CocaCola", "industry": "beverage"},
        "people": ["Ava Chen"],
        "projects": ["Holiday Spot"],
    });
    let fx = fixture(
        vec![
            tool_call_message("get_organization_profile", json!({"org_name": "CocaCola"})),
            Message::assistant("Yes - CocaCola is an active client."),
        ],
        vec![org_row],
    );

    let response = fx
        .agent
        .chat(
            "Do we work with CocaCola?",
            &director(),
            None,
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(response.content, "Yes - CocaCola is an active client.");
    // llm_with_tools + synthesis: the per-turn LLM call ceiling is two.
    assert_eq!(fx.client.call_count(), 2);

    // The durable log carries the whole turn, user message first.
    let record = fx
        .sessions
        .get_latest(&response.conversation_id)
        .await
        .unwrap();
    assert_eq!(record.messages[0].message.role, Role::User);
    assert!(record
        .messages
        .iter()
        .any(|m| matches!(m.message.role, Role::Tool { .. })));
    assert_eq!(
        record.messages.last().unwrap().message.content.as_ref(),
        "Yes - CocaCola is an active client."
    );

    // Exactly one episodic memory stored for the turn.
    let memories = fx.memory_store.list_for_user("u-dir").await.unwrap();
    let episodic: Vec<_> = memories
        .iter()
        .filter(|m| m.kind() == MemoryKind::Episodic)
        .collect();
    assert_eq!(episodic.len(), 1);
}

#[tokio::test]
async fn direct_answer_skips_the_tools_node() {
    let fx = fixture(vec![Message::assistant("Just an answer.")], vec![]);

    let response = fx
        .agent
        .chat("Hello there", &director(), None, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(response.content, "Just an answer.");
    assert_eq!(fx.client.call_count(), 1);
}

#[tokio::test]
async fn failing_tool_still_reaches_synthesis() {
    // The graph returns no rows: the tool reports found=false and the
    // synthesis step sees the partial results.
    let fx = fixture(
        vec![
            tool_call_message("get_person_details", json!({"name": "Nobody"})),
            Message::assistant("I could not find that person."),
        ],
        vec![],
    );

    let response = fx
        .agent
        .chat(
            "Who is Nobody?",
            &director(),
            None,
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(response.content, "I could not find that person.");
    assert_eq!(fx.client.call_count(), 2);
}

#[tokio::test]
async fn results_above_the_caller_ceiling_are_withheld() {
    // get_deal_live_status is tagged Confidential; a Public-ceiling caller
    // must not see its payload.
    let deal_row = json!({
        "deal": {"name": "Nike Q3", "status": "open"},
        "sourced_by": "Ava Chen",
        "contacts": [],
        "organization": "Nike",
    });
    let fx = fixture(
        vec![
            tool_call_message("get_deal_live_status", json!({"deal_name": "Nike Q3"})),
            Message::assistant("done"),
        ],
        vec![deal_row],
    );

    let caller = CallerIdentity::new("u-sales", UserRole::Salesperson, DataSensitivity::Public);
    let response = fx
        .agent
        .chat("What is happening with Nike Q3?", &caller, None, CancellationToken::new())
        .await
        .unwrap();

    let record = fx
        .sessions
        .get_latest(&response.conversation_id)
        .await
        .unwrap();
    let tool_message = record
        .messages
        .iter()
        .find(|m| matches!(m.message.role, Role::Tool { .. }))
        .unwrap();
    assert!(tool_message.message.content.contains("withheld"));
    assert!(!tool_message.message.content.contains("Nike Q3"));
}

#[tokio::test]
async fn llm_unavailable_still_persists_the_user_message() {
    // An empty provider table: the turn fails but the user message and a
    // failure note survive.
    backlot::logging::init();
    let router = Arc::new(LLMRouter::new());
    let registry = Arc::new(ToolRegistry::new());
    let sessions = Arc::new(SessionStore::new(Duration::from_secs(3600)));
    let memory_store = Arc::new(InMemoryMemoryStore::new());
    let memory = Arc::new(MemoryManager::new(
        Arc::clone(&memory_store) as Arc<dyn MemoryStore>,
        Arc::clone(&router),
    ));
    let agent = Agent::new(
        Box::new(SalesBehavior),
        router,
        registry,
        Arc::new(PromptTemplateRegistry::new()),
        Arc::clone(&sessions),
    )
    .with_memory(memory);

    let err = agent
        .chat(
            "Anything there?",
            &director(),
            Some("conv-x"),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ProcessingError::LlmUnavailable(_)));

    let record = sessions.get_latest("conv-x").await.unwrap();
    assert_eq!(record.messages.len(), 1);
    assert_eq!(record.messages[0].message.role, Role::User);

    // update_memory still ran on the partial turn and recorded why it died:
    // an episodic note tagged llm_failure, carrying the router error text.
    let memories = memory_store.list_for_user("u-dir").await.unwrap();
    let failure_note = memories
        .iter()
        .find(|m| match &m.variant {
            MemoryVariant::Episodic { topics, .. } => {
                topics.contains(&"llm_failure".to_string())
            }
            _ => false,
        })
        .expect("durable failure note stored");
    assert!(failure_note.content.contains("No LLM providers available"));
    match &failure_note.variant {
        MemoryVariant::Episodic {
            conversation_id, ..
        } => assert_eq!(conversation_id, "conv-x"),
        other => panic!("unexpected variant: {:?}", other),
    }
}

#[tokio::test]
async fn cancelled_turn_writes_no_memory() {
    // Cancel before the turn starts: the log ends with the user message
    // and no memory is written.
    let fx = fixture(vec![Message::assistant("never delivered")], vec![]);

    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = fx
        .agent
        .chat("Analyze everything", &director(), Some("conv-c"), cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, ProcessingError::Cancelled));

    let record = fx.sessions.get_latest("conv-c").await.unwrap();
    assert_eq!(record.messages.len(), 1);
    assert_eq!(record.messages[0].message.role, Role::User);

    let memories = fx.memory_store.list_for_user("u-dir").await.unwrap();
    assert!(memories.is_empty());
}

#[tokio::test]
async fn second_turn_sees_a_strictly_growing_log() {
    // Two sequential turns on one conversation never interleave and
    // only append.
    let fx = fixture(
        vec![
            Message::assistant("first answer"),
            Message::assistant("second answer"),
        ],
        vec![],
    );

    let first = fx
        .agent
        .chat("First question", &director(), Some("conv-seq"), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(first.content, "first answer");

    let second = fx
        .agent
        .chat("Second question", &director(), Some("conv-seq"), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(second.content, "second answer");

    let record = fx.sessions.get_latest("conv-seq").await.unwrap();
    let contents: Vec<&str> = record
        .messages
        .iter()
        .map(|m| m.message.content.as_ref())
        .collect();
    assert_eq!(
        contents,
        vec![
            "First question",
            "first answer",
            "Second question",
            "second answer"
        ]
    );
}
