//! The conversation graph and agent base.
//!
//! An [`Agent`] drives one turn of a conversation through a small state
//! machine:
//!
//! ```text
//!  Start
//!    -> initialize            (load prior memory if conversation exists)
//!    -> process_query         (agent-specific query analysis)
//!    -> llm_with_tools        (LLM call with tool bindings)
//!    -> [tool calls present?]
//!          yes -> tools  -> generate_response
//!          no  ->        -> generate_response
//!    -> update_memory
//!    -> End
//! ```
//!
//! All transitions are deterministic, no node re-enters within a turn, and at
//! most two LLM calls happen per turn (the tool-binding call plus an optional
//! synthesis completion).  `update_memory` runs exactly once for every turn
//! that starts, partial turns included, except when the turn was cancelled,
//! in which case no memory is written and no assistant message is returned.
//!
//! The agent-specific pieces (query analysis, tool capability set, preferred
//! provider, system prompt) come from an [`AgentBehavior`] implementation; the
//! three concrete behaviors live in [`crate::backlot::agents`].

use crate::backlot::client_wrapper::{Message, Role};
use crate::backlot::identity::CallerIdentity;
use crate::backlot::memory::background::BackgroundProcessor;
use crate::backlot::memory::manager::MemoryManager;
use crate::backlot::prompts::{PromptKind, PromptTemplateRegistry};
use crate::backlot::router::{LLMRouter, LlmRequest, ProviderId, RouterError};
use crate::backlot::session::{SessionStore, StoredMessage};
use crate::backlot::tool_protocol::{ToolCategory, ToolRegistry, ToolResult};
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// The specialized agent kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    Sales,
    Talent,
    Analytics,
}

impl AgentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Sales => "sales",
            AgentKind::Talent => "talent",
            AgentKind::Analytics => "analytics",
        }
    }

    /// Display name with the leading capital, used in synthesis headers.
    pub fn title(&self) -> &'static str {
        match self {
            AgentKind::Sales => "Sales",
            AgentKind::Talent => "Talent",
            AgentKind::Analytics => "Analytics",
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of the agent-specific query analysis hook.
#[derive(Debug, Clone)]
pub struct TaskAnalysis {
    /// Detected intent label.
    pub intent: String,
    /// Task type used to select a task-specific prompt template.
    pub task_type: String,
    /// Parameters forwarded into the task template.
    pub task_params: Value,
    /// Whether the query needs knowledge-graph tools at all.
    pub requires_knowledge_graph: bool,
    /// Coarse complexity label recorded for provenance.
    pub complexity: String,
}

impl TaskAnalysis {
    /// A neutral analysis for agents that delegate tool selection entirely to
    /// the LLM.
    pub fn general(complexity: &str) -> Self {
        TaskAnalysis {
            intent: "general".to_string(),
            task_type: "general".to_string(),
            task_params: Value::Null,
            requires_knowledge_graph: true,
            complexity: complexity.to_string(),
        }
    }
}

/// Per-turn mutable context.  Owned by exactly one executing turn; never shared
/// across turns except through the session store.
pub struct AgentState {
    pub conversation_id: String,
    pub caller: CallerIdentity,
    /// Message log for this turn, append-only; starts with the prior history.
    pub messages: Vec<Message>,
    /// Index into `messages` where this turn's new messages begin.
    pub turn_start: usize,
    pub task_analysis: Option<TaskAnalysis>,
    /// Tool results keyed by tool name, last write wins within a turn.
    pub tool_results: HashMap<String, ToolResult>,
    /// Tool-name emission order, for deterministic synthesis prompts.
    pub tool_order: Vec<String>,
    pub tool_errors: Vec<String>,
    /// Conversation memory blob carried between turns.
    pub memory: Value,
    pub last_updated: DateTime<Utc>,
    /// Name of the last completed node, persisted as the checkpoint.
    pub checkpoint: Option<String>,
}

impl AgentState {
    fn new(conversation_id: String, caller: CallerIdentity) -> Self {
        AgentState {
            conversation_id,
            caller,
            messages: Vec::new(),
            turn_start: 0,
            task_analysis: None,
            tool_results: HashMap::new(),
            tool_order: Vec::new(),
            tool_errors: Vec::new(),
            memory: Value::Null,
            last_updated: Utc::now(),
            checkpoint: None,
        }
    }

    fn latest_user_query(&self) -> Option<String> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.to_string())
    }
}

/// Errors terminating a turn.
#[derive(Debug)]
pub enum ProcessingError {
    /// The state carried no user message to process.
    NoUserQuery,
    /// The LLM layer is unavailable (no providers, or primary and fallback
    /// both failed).  The user message was persisted and a durable failure
    /// note is written into memory at the graph boundary.
    LlmUnavailable(String),
    /// The caller's transport dropped; clean teardown, nothing persisted for
    /// this turn beyond the user message.
    Cancelled,
}

impl fmt::Display for ProcessingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessingError::NoUserQuery => write!(f, "No user query found"),
            ProcessingError::LlmUnavailable(msg) => write!(f, "LLM layer unavailable: {}", msg),
            ProcessingError::Cancelled => write!(f, "Turn cancelled"),
        }
    }
}

impl Error for ProcessingError {}

/// Agent-specific hooks: analysis, capability set, prompts, provider hint.
#[async_trait::async_trait]
pub trait AgentBehavior: Send + Sync {
    /// Which agent this is.
    fn kind(&self) -> AgentKind;

    /// Prompt family used for the system prompt.
    fn prompt_kind(&self) -> PromptKind;

    /// Tool categories this agent requires from the registry.
    fn tool_categories(&self) -> HashSet<ToolCategory>;

    /// Provider hint forwarded to the router; `None` uses the router default.
    fn preferred_provider(&self) -> Option<ProviderId> {
        None
    }

    /// Analyze the query for agent-specific context.
    async fn analyze_query(&self, query: &str, caller: &CallerIdentity) -> TaskAnalysis;
}

/// Final product of one agent turn.
#[derive(Debug, Clone)]
pub struct AgentTurnResponse {
    pub content: String,
    pub conversation_id: String,
    pub agent_kind: AgentKind,
    /// Provider that produced the final content, when an LLM was involved.
    pub provider: Option<ProviderId>,
    pub model: Option<String>,
    pub timestamp: DateTime<Utc>,
}

const FALLBACK_APOLOGY: &str =
    "I apologize, but I wasn't able to generate a response to your query. Please try again.";
const ERROR_APOLOGY: &str =
    "I encountered an error while processing your request. Please try again.";
const TIMEOUT_APOLOGY: &str =
    "I wasn't able to complete that request in time. Please try again.";

/// An LLM-powered agent driving the conversation graph.
pub struct Agent {
    behavior: Box<dyn AgentBehavior>,
    router: Arc<LLMRouter>,
    registry: Arc<ToolRegistry>,
    prompts: Arc<PromptTemplateRegistry>,
    sessions: Arc<SessionStore>,
    memory: Option<Arc<MemoryManager>>,
    background: Option<Arc<BackgroundProcessor>>,
    turn_timeout: Duration,
    max_history: usize,
}

impl Agent {
    pub fn new(
        behavior: Box<dyn AgentBehavior>,
        router: Arc<LLMRouter>,
        registry: Arc<ToolRegistry>,
        prompts: Arc<PromptTemplateRegistry>,
        sessions: Arc<SessionStore>,
    ) -> Self {
        info!("initialized {} agent", behavior.kind());
        Agent {
            behavior,
            router,
            registry,
            prompts,
            sessions,
            memory: None,
            background: None,
            turn_timeout: Duration::from_secs(60),
            max_history: 20,
        }
    }

    /// Attach the memory manager (builder pattern).
    pub fn with_memory(mut self, memory: Arc<MemoryManager>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Attach the background processor for deferred fact extraction (builder
    /// pattern).
    pub fn with_background(mut self, background: Arc<BackgroundProcessor>) -> Self {
        self.background = Some(background);
        self
    }

    /// Override the turn wall-clock ceiling (builder pattern).
    pub fn with_turn_timeout(mut self, timeout: Duration) -> Self {
        self.turn_timeout = timeout;
        self
    }

    /// Override the history cap forwarded to the LLM (builder pattern).
    pub fn with_max_history(mut self, max_history: usize) -> Self {
        self.max_history = max_history;
        self
    }

    pub fn kind(&self) -> AgentKind {
        self.behavior.kind()
    }

    /// Names of the tools bound to this agent.
    pub fn bound_tools(&self) -> Vec<String> {
        self.registry
            .specs_for_categories(&self.behavior.tool_categories())
            .into_iter()
            .map(|spec| spec.name.clone())
            .collect()
    }

    /// Drive one turn of the conversation.
    ///
    /// Serialized per conversation id by the session store lock.  Honors
    /// `cancel` at every node boundary; a cancelled turn persists nothing
    /// beyond the user message and returns [`ProcessingError::Cancelled`].
    pub async fn chat(
        &self,
        message: &str,
        caller: &CallerIdentity,
        conversation_id: Option<&str>,
        cancel: CancellationToken,
    ) -> Result<AgentTurnResponse, ProcessingError> {
        let conversation_id = conversation_id
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        // Turns on one conversation are strictly sequential.
        let _turn_guard = self.sessions.lock_conversation(&conversation_id).await;

        let mut record = self.sessions.open(&conversation_id, &caller.user_id).await;
        if !record.agent_kinds.iter().any(|k| k == self.kind().as_str()) {
            record.agent_kinds.push(self.kind().as_str().to_string());
        }

        let mut state = AgentState::new(conversation_id.clone(), caller.clone());
        state.messages = record.messages.iter().map(|m| m.message.clone()).collect();
        state.messages.push(Message::user(message));
        state.turn_start = state.messages.len() - 1;

        // The user message is durable even if the turn dies mid-flight.
        record.messages.push(StoredMessage {
            message: Message::user(message),
            timestamp: Utc::now(),
        });
        self.sessions.put(record).await;

        let had_prior_history = state.turn_start > 0;

        enum TurnOutcome {
            Completed(Result<(), ProcessingError>),
            TimedOut,
            Cancelled,
        }

        let raw_outcome = tokio::select! {
            _ = cancel.cancelled() => TurnOutcome::Cancelled,
            result = tokio::time::timeout(
                self.turn_timeout,
                self.execute_turn(&mut state, had_prior_history, &cancel),
            ) => match result {
                Ok(inner) => TurnOutcome::Completed(inner),
                Err(_) => TurnOutcome::TimedOut,
            },
        };

        let outcome = match raw_outcome {
            TurnOutcome::Cancelled => Err(ProcessingError::Cancelled),
            TurnOutcome::TimedOut => {
                warn!(
                    "turn exceeded {:?} ceiling on conversation {}",
                    self.turn_timeout, conversation_id
                );
                state.messages.push(Message::assistant(TIMEOUT_APOLOGY));
                Ok(())
            }
            TurnOutcome::Completed(result) => result,
        };

        match outcome {
            Err(ProcessingError::Cancelled) => {
                info!("turn cancelled on conversation {}", conversation_id);
                Err(ProcessingError::Cancelled)
            }
            Err(err) => {
                // The graph boundary still persists partial state.
                self.update_memory(&mut state).await;
                Err(err)
            }
            Ok(()) => {
                self.update_memory(&mut state).await;

                let content = state
                    .messages
                    .iter()
                    .rev()
                    .find(|m| {
                        m.role == Role::Assistant
                            && !m.content.is_empty()
                    })
                    .map(|m| m.content.to_string())
                    .ok_or(ProcessingError::NoUserQuery)?;

                Ok(AgentTurnResponse {
                    content,
                    conversation_id,
                    agent_kind: self.kind(),
                    provider: state
                        .memory
                        .get("last_response_metadata")
                        .and_then(|m| m.get("provider"))
                        .and_then(Value::as_str)
                        .and_then(provider_from_str),
                    model: state
                        .memory
                        .get("last_response_metadata")
                        .and_then(|m| m.get("model"))
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    timestamp: state.last_updated,
                })
            }
        }
    }

    /// Run the graph nodes in order, checking for cancellation between nodes.
    async fn execute_turn(
        &self,
        state: &mut AgentState,
        had_prior_history: bool,
        cancel: &CancellationToken,
    ) -> Result<(), ProcessingError> {
        let check = |cancel: &CancellationToken| {
            if cancel.is_cancelled() {
                Err(ProcessingError::Cancelled)
            } else {
                Ok(())
            }
        };

        check(cancel)?;
        self.node_initialize(state, had_prior_history).await;

        check(cancel)?;
        self.node_process_query(state).await?;

        check(cancel)?;
        self.node_llm_with_tools(state).await?;

        // Branch on the last message: tool calls route through the tools node.
        let has_calls = state
            .messages
            .last()
            .map(Message::has_tool_calls)
            .unwrap_or(false);
        if has_calls {
            check(cancel)?;
            self.node_tools(state).await;
        }

        check(cancel)?;
        self.node_generate_response(state).await;

        Ok(())
    }

    /// `initialize`: load prior memory context, clear per-turn tool state.
    async fn node_initialize(&self, state: &mut AgentState, had_prior_history: bool) {
        state.tool_results.clear();
        state.tool_order.clear();
        state.tool_errors.clear();
        state.last_updated = Utc::now();

        if had_prior_history {
            if let (Some(memory), Some(query)) = (&self.memory, state.latest_user_query()) {
                let context = memory
                    .build_memory_context_for_caller(&state.caller, &query)
                    .await;
                state.memory = json!({
                    "semantic_facts": context.semantic_facts,
                    "past_interactions": context.past_interactions,
                    "behavioral_patterns": context.behavioral_patterns,
                });
            }
        } else {
            state.memory = json!({});
        }

        state.checkpoint = Some("initialize".to_string());
    }

    /// `process_query`: delegate to the behavior's analysis hook.
    async fn node_process_query(&self, state: &mut AgentState) -> Result<(), ProcessingError> {
        let query = state
            .latest_user_query()
            .ok_or(ProcessingError::NoUserQuery)?;

        let analysis = self.behavior.analyze_query(&query, &state.caller).await;
        debug!(
            "{} agent analyzed query: intent={}",
            self.kind(),
            analysis.intent
        );
        state.task_analysis = Some(analysis);
        state.checkpoint = Some("process_query".to_string());
        Ok(())
    }

    /// `llm_with_tools`: invoke the LLM with the agent's tool bindings.
    async fn node_llm_with_tools(&self, state: &mut AgentState) -> Result<(), ProcessingError> {
        let query = state
            .latest_user_query()
            .ok_or(ProcessingError::NoUserQuery)?;

        let caller_context = json!({
            "role": state.caller.role.as_str(),
            "access_level": state.caller.max_sensitivity.as_str(),
            "name": state.caller.name,
        });

        let analysis = state.task_analysis.as_ref();
        let task_type = analysis
            .map(|a| a.task_type.as_str())
            .filter(|t| *t != "general");
        let task_params = analysis.map(|a| &a.task_params).filter(|p| !p.is_null());

        let mut messages = self.prompts.format_conversation_prompt(
            self.behavior.prompt_kind(),
            &query,
            Some(&caller_context),
            task_type,
            task_params,
        );

        // Splice prior history between the system prompt and the fresh query.
        if state.turn_start > 0 {
            let history_from = state.turn_start.saturating_sub(self.max_history);
            let history: Vec<Message> =
                state.messages[history_from..state.turn_start].to_vec();
            let query_message = match messages.pop() {
                Some(m) => m,
                None => Message::user(&query),
            };
            messages.extend(history);
            messages.push(query_message);
        }

        let definitions = self
            .registry
            .definitions_for_categories(&self.behavior.tool_categories());

        let mut request = LlmRequest::from_messages(messages);
        if let Some(provider) = self.behavior.preferred_provider() {
            request = request.with_preferred_provider(provider);
        }
        if !definitions.is_empty() {
            request = request.with_tools(definitions);
        }

        match self.router.route_query(request).await {
            Ok(response) => {
                if !response.message.tool_calls.is_empty() {
                    debug!(
                        "{} agent received {} tool calls",
                        self.kind(),
                        response.message.tool_calls.len()
                    );
                }
                state.memory["last_response_metadata"] = json!({
                    "provider": response.provider.as_str(),
                    "model": response.model,
                    "tokens": response.usage.as_ref().map(|u| u.total_tokens).unwrap_or(0),
                    "cost": response.cost_estimate,
                    "response_time_ms": response.latency.as_millis() as u64,
                });
                state.messages.push(response.message);
            }
            Err(err @ RouterError::NoProvidersAvailable)
            | Err(err @ RouterError::AllProvidersFailed { .. }) => {
                error!("LLM dispatch failed: {}", err);
                state.memory["last_failure"] = json!({
                    "error": err.to_string(),
                    "at": Utc::now().to_rfc3339(),
                });
                return Err(ProcessingError::LlmUnavailable(err.to_string()));
            }
            Err(err) => {
                error!("LLM with tools failed: {}", err);
                state.tool_errors.push(err.to_string());
                state.messages.push(Message::assistant(ERROR_APOLOGY));
            }
        }

        state.checkpoint = Some("llm_with_tools".to_string());
        Ok(())
    }

    /// `tools`: execute the requested calls in emission order.
    ///
    /// Within one turn at most one call per tool name is in flight: calls run
    /// strictly sequentially here, and the result map is last-write-wins per
    /// name.  Results above the caller's sensitivity ceiling are withheld; a
    /// failing call lands in `tool_errors` and the loop continues.
    async fn node_tools(&self, state: &mut AgentState) {
        let calls = state
            .messages
            .last()
            .map(|m| m.tool_calls.clone())
            .unwrap_or_default();

        for call in calls {
            let result = match self.registry.execute(&call.name, call.arguments.clone()).await {
                Ok(result) => {
                    if state.caller.can_access(result.sensitivity) {
                        result
                    } else {
                        ToolResult::not_found(
                            "Result withheld: exceeds your data access level",
                        )
                    }
                }
                Err(err) => {
                    state.tool_errors.push(err.to_string());
                    ToolResult::failure(err.to_string())
                }
            };

            if let Some(err) = &result.error {
                if !result.found {
                    debug!("tool {} reported: {}", call.name, err);
                }
            }

            state
                .messages
                .push(Message::tool_result(call.id.clone(), result.to_prompt_text()));
            if !state.tool_order.contains(&call.name) {
                state.tool_order.push(call.name.clone());
            }
            state.tool_results.insert(call.name, result);
        }

        state.checkpoint = Some("tools".to_string());
    }

    /// `generate_response`: keep an existing assistant answer, synthesize from
    /// tool results, or fall back to an apology.
    async fn node_generate_response(&self, state: &mut AgentState) {
        let last = state.messages.last().cloned();

        let has_final_answer = last
            .as_ref()
            .map(|m| {
                m.role == Role::Assistant
                    && !m.content.is_empty()
                    && m.tool_calls.is_empty()
            })
            .unwrap_or(false);

        if has_final_answer {
            state.checkpoint = Some("generate_response".to_string());
            return;
        }

        if !state.tool_results.is_empty() {
            state.memory["last_tool_usage"] = json!({
                "tools_used": state.tool_order,
                "timestamp": Utc::now().to_rfc3339(),
                "success": state.tool_errors.is_empty(),
            });

            let prompt = self.create_synthesis_prompt(state);
            let mut request = LlmRequest::from_messages(vec![Message::user(prompt)]);
            if let Some(provider) = self.behavior.preferred_provider() {
                request = request.with_preferred_provider(provider);
            }

            match self.router.route_query(request).await {
                Ok(response) => {
                    state.memory["last_response_metadata"] = json!({
                        "provider": response.provider.as_str(),
                        "model": response.model,
                        "tokens": response.usage.as_ref().map(|u| u.total_tokens).unwrap_or(0),
                        "cost": response.cost_estimate,
                        "response_time_ms": response.latency.as_millis() as u64,
                    });
                    state.messages.push(response.message);
                }
                Err(err) => {
                    error!("synthesis failed, falling back to tool summary: {}", err);
                    let summary = create_tool_summary(state);
                    state.messages.push(Message::assistant(summary));
                }
            }
        } else {
            warn!("no response generated, creating fallback");
            state.messages.push(Message::assistant(FALLBACK_APOLOGY));
        }

        state.checkpoint = Some("generate_response".to_string());
    }

    /// Build the synthesis prompt from the original query and the gathered
    /// tool results.
    fn create_synthesis_prompt(&self, state: &AgentState) -> String {
        let query = state.latest_user_query().unwrap_or_default();

        let tool_context: Vec<String> = state
            .tool_order
            .iter()
            .filter_map(|name| {
                state
                    .tool_results
                    .get(name)
                    .map(|result| format!("**{}**: {}", name, result.to_prompt_text()))
            })
            .collect();

        format!(
            "Based on the user's question: \"{}\"\n\nI have gathered the following information:\n\n{}\n\nPlease provide a comprehensive and helpful response to the user's question using this information. Be conversational and directly address their query.",
            query,
            tool_context.join("\n")
        )
    }

    /// `update_memory`: persist the session record and hand the turn to the
    /// memory subsystem.  Persistence failures log and never fail the turn.
    async fn update_memory(&self, state: &mut AgentState) {
        state.last_updated = Utc::now();

        if let Some(mut record) = self.sessions.get_latest(&state.conversation_id).await {
            // The user message was persisted at turn start; append everything
            // generated after it.
            for message in &state.messages[state.turn_start + 1..] {
                record.messages.push(StoredMessage {
                    message: message.clone(),
                    timestamp: state.last_updated,
                });
            }
            record.checkpoint = state.checkpoint.clone();
            self.sessions.put(record).await;
        }

        let agent_kinds = vec![self.kind().as_str().to_string()];
        let turn_messages = &state.messages[state.turn_start..];

        // A turn that died in the LLM layer leaves a durable failure note
        // alongside the user message.
        if let Some(memory) = &self.memory {
            if let Some(failure) = state
                .memory
                .get("last_failure")
                .and_then(|f| f.get("error"))
                .and_then(Value::as_str)
            {
                memory
                    .store_failure_note(
                        &state.conversation_id,
                        &state.caller.user_id,
                        &format!("Turn failed before a response was produced: {}", failure),
                    )
                    .await;
            }
        }

        match (&self.background, &self.memory) {
            (Some(background), Some(memory)) => {
                let queued = background
                    .queue_memory_extraction(
                        &state.caller.user_id,
                        &state.conversation_id,
                        turn_messages,
                        &agent_kinds,
                    )
                    .await;
                if !queued {
                    // Extraction dropped under backpressure; the episodic
                    // record is still stored.
                    memory
                        .store_episodic(
                            &state.conversation_id,
                            &state.caller.user_id,
                            turn_messages,
                            &agent_kinds,
                        )
                        .await;
                }
            }
            (None, Some(memory)) => {
                memory
                    .extract_conversation_memories(
                        &state.conversation_id,
                        &state.caller.user_id,
                        turn_messages,
                        &agent_kinds,
                    )
                    .await;
            }
            _ => {}
        }

        state.checkpoint = Some("update_memory".to_string());
    }

    /// Full message history of a conversation, oldest first.
    pub async fn conversation_history(
        &self,
        conversation_id: &str,
        limit: Option<usize>,
    ) -> Vec<Message> {
        match self.sessions.get_latest(conversation_id).await {
            Some(record) => {
                let messages: Vec<Message> =
                    record.messages.iter().map(|m| m.message.clone()).collect();
                match limit {
                    Some(limit) if messages.len() > limit => {
                        messages[messages.len() - limit..].to_vec()
                    }
                    _ => messages,
                }
            }
            None => Vec::new(),
        }
    }

    /// Drop a conversation's durable state.
    pub async fn clear_conversation(&self, conversation_id: &str) -> bool {
        self.sessions.delete(conversation_id).await.is_ok()
    }

    /// Agent health for the status surface.
    pub fn status(&self) -> Value {
        let tools = self.bound_tools();
        json!({
            "agent_kind": self.kind().as_str(),
            "status": "healthy",
            "tool_configuration": {
                "has_tools": !tools.is_empty(),
                "tool_count": tools.len(),
                "bound_tools": tools,
            },
            "preferred_provider": self.behavior.preferred_provider().map(|p| p.as_str()),
        })
    }
}

fn provider_from_str(name: &str) -> Option<ProviderId> {
    match name {
        "together" => Some(ProviderId::Together),
        "openai" => Some(ProviderId::OpenAI),
        "anthropic" => Some(ProviderId::Anthropic),
        _ => None,
    }
}

/// Basic summary of tool results used when synthesis itself fails.
fn create_tool_summary(state: &AgentState) -> String {
    if state.tool_results.is_empty() {
        return "I wasn't able to find any relevant information for your query.".to_string();
    }

    let parts: Vec<String> = state
        .tool_order
        .iter()
        .filter_map(|name| state.tool_results.get(name).map(|r| (name, r)))
        .filter(|(_, r)| r.found)
        .map(|(name, result)| {
            let text = result.to_prompt_text();
            let prefix: String = text.chars().take(200).collect();
            format!("From {}: {}...", name, prefix)
        })
        .collect();

    if parts.is_empty() {
        "I searched for information but didn't find any relevant results.".to_string()
    } else {
        format!("Here's what I found:\n\n{}", parts.join("\n\n"))
    }
}
