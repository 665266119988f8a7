//! Query supervision and multi-agent orchestration.
//!
//! The [`Supervisor`] accepts a vetted query, classifies it against per-domain
//! keyword sets, and delegates to one or more registered [`Agent`]s.  Under the
//! multi-agent strategy every agent runs in parallel on a scoped conversation
//! id; the successful outputs are merged by a synthesis LLM call (or, when that
//! fails, concatenated with per-agent headers).
//!
//! Ordering: turns on one conversation are strictly sequential (the session
//! store lock); the fan-out within a turn is unordered and synthesis depends
//! only on which outputs succeeded.  Cancellation propagates to every in-flight
//! agent.

use crate::backlot::conversation::{Agent, AgentKind, ProcessingError};
use crate::backlot::client_wrapper::Message;
use crate::backlot::identity::CallerIdentity;
use crate::backlot::memory::background::BackgroundProcessor;
use crate::backlot::router::{LLMRouter, LlmRequest};
use crate::backlot::session::{SessionStore, StoredMessage};
use crate::backlot::tool_protocol::ToolRegistry;
use chrono::Utc;
use log::{debug, error, info, warn};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Agent routing strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingStrategy {
    SingleAgent,
    MultiAgent,
}

/// The supervisor's routing decision, attached to every response for
/// auditability.
#[derive(Debug, Clone, Serialize)]
pub struct RoutingDecision {
    pub strategy: RoutingStrategy,
    pub primary: AgentKind,
    pub participants: Vec<AgentKind>,
}

/// Routing metadata surfaced on the response.
#[derive(Debug, Clone, Serialize)]
pub struct RoutingInfo {
    pub strategy: RoutingStrategy,
    pub primary_agent: String,
    pub agents_used: Vec<String>,
}

/// Final supervisor response.
#[derive(Debug, Clone)]
pub struct SupervisorResponse {
    pub content: String,
    pub conversation_id: String,
    /// `"sales"` / `"talent"` / `"analytics"` for single-agent runs,
    /// `"orchestrator"` for synthesized multi-agent runs.
    pub agent_type: String,
    pub routing: RoutingInfo,
    pub timestamp: chrono::DateTime<Utc>,
}

/// Errors surfaced by the supervisor.
#[derive(Debug)]
pub enum SupervisorError {
    /// The routing decision named an agent that is not registered.
    AgentNotAvailable(AgentKind),
    /// The delegated turn failed.
    Processing(ProcessingError),
    /// No agent produced any content.
    NoResponse,
}

impl fmt::Display for SupervisorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SupervisorError::AgentNotAvailable(kind) => {
                write!(f, "Agent {} not available", kind)
            }
            SupervisorError::Processing(err) => write!(f, "Query processing failed: {}", err),
            SupervisorError::NoResponse => write!(f, "No agent produced a response"),
        }
    }
}

impl Error for SupervisorError {}

struct DomainRule {
    agent: AgentKind,
    keywords: &'static [&'static str],
}

/// Fixed evaluation order so classification ties break deterministically.
fn routing_rules() -> Vec<DomainRule> {
    vec![
        DomainRule {
            agent: AgentKind::Sales,
            keywords: &[
                "lead", "sales", "market", "pricing", "revenue", "client", "prospect",
                "opportunity",
            ],
        },
        DomainRule {
            agent: AgentKind::Talent,
            keywords: &[
                "talent", "hire", "crew", "skills", "team", "staff", "casting", "union",
            ],
        },
        DomainRule {
            agent: AgentKind::Analytics,
            keywords: &[
                "analytics", "performance", "metrics", "report", "analysis", "trend",
                "forecast", "kpi",
            ],
        },
    ]
}

/// Orchestrates the specialized agents for complex entertainment-industry
/// queries.
pub struct Supervisor {
    agents: HashMap<AgentKind, Arc<Agent>>,
    agent_order: Vec<AgentKind>,
    router: Arc<LLMRouter>,
    sessions: Arc<SessionStore>,
    registry: Arc<ToolRegistry>,
    background: Option<Arc<BackgroundProcessor>>,
    confidence_threshold: f64,
    multi_agent_threshold: f64,
}

impl Supervisor {
    pub fn new(
        router: Arc<LLMRouter>,
        sessions: Arc<SessionStore>,
        registry: Arc<ToolRegistry>,
    ) -> Self {
        Supervisor {
            agents: HashMap::new(),
            agent_order: Vec::new(),
            router,
            sessions,
            registry,
            background: None,
            confidence_threshold: 0.7,
            multi_agent_threshold: 0.3,
        }
    }

    /// Register an agent.  Registration order is the deterministic fan-out
    /// and tie-break order.
    pub fn add_agent(&mut self, agent: Agent) {
        let kind = agent.kind();
        if !self.agents.contains_key(&kind) {
            self.agent_order.push(kind);
        }
        self.agents.insert(kind, Arc::new(agent));
        info!("registered {} agent with supervisor", kind);
    }

    /// Attach the background processor, for the status surface (builder
    /// pattern).
    pub fn with_background(mut self, background: Arc<BackgroundProcessor>) -> Self {
        self.background = Some(background);
        self
    }

    /// Override the single-agent confidence threshold (builder pattern).
    pub fn with_confidence_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Override the multi-agent score threshold (builder pattern).
    pub fn with_multi_agent_threshold(mut self, threshold: f64) -> Self {
        self.multi_agent_threshold = threshold;
        self
    }

    /// Classify a query into a routing decision.
    ///
    /// Each domain scores `matching keywords / keyword set size`.  More than
    /// one domain at or above the multi-agent threshold routes MultiAgent with
    /// the best domain primary; a single domain at or above its confidence
    /// threshold routes to it; anything else falls back to Sales.
    pub fn classify_query(&self, query: &str) -> RoutingDecision {
        let query_lower = query.to_lowercase();
        let rules = routing_rules();

        let scores: Vec<(AgentKind, f64)> = rules
            .iter()
            .map(|rule| {
                let matches = rule
                    .keywords
                    .iter()
                    .filter(|keyword| query_lower.contains(*keyword))
                    .count();
                (rule.agent, matches as f64 / rule.keywords.len() as f64)
            })
            .collect();

        // First in rule order wins ties.
        let (best_agent, best_score) = scores
            .iter()
            .fold((AgentKind::Sales, -1.0), |acc, &(agent, score)| {
                if score > acc.1 {
                    (agent, score)
                } else {
                    acc
                }
            });

        let high_scoring: Vec<AgentKind> = scores
            .iter()
            .filter(|(_, score)| *score >= self.multi_agent_threshold)
            .map(|(agent, _)| *agent)
            .collect();

        let decision = if high_scoring.len() > 1 {
            RoutingDecision {
                strategy: RoutingStrategy::MultiAgent,
                primary: best_agent,
                participants: self.agent_order.clone(),
            }
        } else if best_score >= self.confidence_threshold {
            RoutingDecision {
                strategy: RoutingStrategy::SingleAgent,
                primary: best_agent,
                participants: vec![best_agent],
            }
        } else {
            RoutingDecision {
                strategy: RoutingStrategy::SingleAgent,
                primary: AgentKind::Sales,
                participants: vec![AgentKind::Sales],
            }
        };

        debug!(
            "query classified: best={} score={:.2} strategy={:?}",
            best_agent, best_score, decision.strategy
        );
        decision
    }

    /// Route a query to the appropriate agent(s) and return the annotated
    /// response.
    pub async fn route_query(
        &self,
        query: &str,
        caller: &CallerIdentity,
        preferred_agent: Option<AgentKind>,
        conversation_id: Option<&str>,
        cancel: CancellationToken,
    ) -> Result<SupervisorResponse, SupervisorError> {
        let decision = match preferred_agent {
            Some(kind) => RoutingDecision {
                strategy: RoutingStrategy::SingleAgent,
                primary: kind,
                participants: vec![kind],
            },
            None => self.classify_query(query),
        };

        match decision.strategy {
            RoutingStrategy::SingleAgent => {
                self.single_agent_response(decision.primary, query, caller, conversation_id, cancel)
                    .await
            }
            RoutingStrategy::MultiAgent => {
                self.multi_agent_response(decision, query, caller, conversation_id, cancel)
                    .await
            }
        }
    }

    async fn single_agent_response(
        &self,
        kind: AgentKind,
        query: &str,
        caller: &CallerIdentity,
        conversation_id: Option<&str>,
        cancel: CancellationToken,
    ) -> Result<SupervisorResponse, SupervisorError> {
        let agent = self
            .agents
            .get(&kind)
            .ok_or(SupervisorError::AgentNotAvailable(kind))?;

        let turn = agent
            .chat(query, caller, conversation_id, cancel)
            .await
            .map_err(SupervisorError::Processing)?;

        Ok(SupervisorResponse {
            content: turn.content,
            conversation_id: turn.conversation_id,
            agent_type: kind.as_str().to_string(),
            routing: RoutingInfo {
                strategy: RoutingStrategy::SingleAgent,
                primary_agent: kind.as_str().to_string(),
                agents_used: vec![kind.as_str().to_string()],
            },
            timestamp: Utc::now(),
        })
    }

    async fn multi_agent_response(
        &self,
        decision: RoutingDecision,
        query: &str,
        caller: &CallerIdentity,
        conversation_id: Option<&str>,
        cancel: CancellationToken,
    ) -> Result<SupervisorResponse, SupervisorError> {
        let conversation_id = conversation_id
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        // Fan out one task per registered agent, each on a scoped conversation
        // id so per-agent histories never interleave.
        let mut handles = Vec::new();
        for kind in &self.agent_order {
            let agent = match self.agents.get(kind) {
                Some(agent) => Arc::clone(agent),
                None => continue,
            };
            let kind = *kind;
            let scoped_id = format!("{}_{}", conversation_id, kind.as_str());
            let query = query.to_string();
            let caller = caller.clone();
            let child_cancel = cancel.child_token();

            handles.push((kind, tokio::spawn(async move {
                agent
                    .chat(&query, &caller, Some(&scoped_id), child_cancel)
                    .await
            })));
        }

        // Await all, ignoring individual failures.
        let mut successes: Vec<(AgentKind, String)> = Vec::new();
        let mut cancelled = false;
        for (kind, handle) in handles {
            match handle.await {
                Ok(Ok(turn)) => successes.push((kind, turn.content)),
                Ok(Err(ProcessingError::Cancelled)) => cancelled = true,
                Ok(Err(err)) => error!("agent {} failed: {}", kind, err),
                Err(join_err) => error!("agent {} task panicked: {}", kind, join_err),
            }
        }

        if cancelled && successes.is_empty() {
            return Err(SupervisorError::Processing(ProcessingError::Cancelled));
        }

        if successes.is_empty() {
            // Zero succeeded: fall back to a plain Sales run.
            warn!("multi-agent fan-out produced no output, falling back to sales");
            return self
                .single_agent_response(
                    AgentKind::Sales,
                    query,
                    caller,
                    Some(&conversation_id),
                    cancel,
                )
                .await;
        }

        let agents_used: Vec<String> = successes
            .iter()
            .map(|(kind, _)| kind.as_str().to_string())
            .collect();

        let content = if successes.len() == 1 {
            successes[0].1.clone()
        } else {
            self.synthesize_responses(query, &successes).await
        };

        // The canonical conversation carries the user message and exactly one
        // synthesized assistant message for this turn.
        self.persist_canonical_turn(&conversation_id, caller, query, &content)
            .await;

        Ok(SupervisorResponse {
            content,
            conversation_id,
            agent_type: "orchestrator".to_string(),
            routing: RoutingInfo {
                strategy: RoutingStrategy::MultiAgent,
                primary_agent: decision.primary.as_str().to_string(),
                agents_used,
            },
            timestamp: Utc::now(),
        })
    }

    /// Merge per-agent outputs with a synthesis completion; concatenate with
    /// per-agent headers when synthesis fails.
    async fn synthesize_responses(
        &self,
        query: &str,
        responses: &[(AgentKind, String)],
    ) -> String {
        let mut prompt = format!(
            "Original Query: {}\n\nMultiple AI agents have provided insights:\n\n",
            query
        );
        for (kind, content) in responses {
            prompt.push_str(&format!("{} Agent Response:\n{}\n\n", kind.title(), content));
        }
        prompt.push_str(
            "Please synthesize these responses into a comprehensive, coherent answer that:\n\
             1. Addresses the original query completely\n\
             2. Integrates insights from all agents\n\
             3. Identifies any complementary or conflicting information\n\
             4. Provides clear, actionable recommendations\n\n\
             Synthesized Response:",
        );

        let request = LlmRequest::from_messages(vec![Message::user(prompt)]);
        match self.router.route_query(request).await {
            Ok(response) => response.message.content.to_string(),
            Err(err) => {
                error!("response synthesis failed: {}", err);
                responses
                    .iter()
                    .map(|(kind, content)| {
                        format!("**{} Perspective:**\n{}", kind.title(), content)
                    })
                    .collect::<Vec<_>>()
                    .join("\n\n")
            }
        }
    }

    async fn persist_canonical_turn(
        &self,
        conversation_id: &str,
        caller: &CallerIdentity,
        query: &str,
        content: &str,
    ) {
        let _guard = self.sessions.lock_conversation(conversation_id).await;
        let mut record = self.sessions.open(conversation_id, &caller.user_id).await;
        let now = Utc::now();
        record.messages.push(StoredMessage {
            message: Message::user(query),
            timestamp: now,
        });
        record.messages.push(StoredMessage {
            message: Message::assistant(content),
            timestamp: now,
        });
        if !record.agent_kinds.iter().any(|k| k == "orchestrator") {
            record.agent_kinds.push("orchestrator".to_string());
        }
        self.sessions.put(record).await;
    }

    /// Aggregate health of providers, agents, tools, memory, and sessions.
    pub async fn status(&self) -> Value {
        let mut agents = serde_json::Map::new();
        for kind in &self.agent_order {
            if let Some(agent) = self.agents.get(kind) {
                agents.insert(kind.as_str().to_string(), agent.status());
            }
        }

        let provider_stats: HashMap<String, Value> = self
            .router
            .provider_stats()
            .into_iter()
            .map(|(id, snapshot)| {
                (
                    id.as_str().to_string(),
                    serde_json::to_value(snapshot).unwrap_or(Value::Null),
                )
            })
            .collect();

        let memory_status = match &self.background {
            Some(background) => background.status().await,
            None => json!({ "running": false }),
        };

        json!({
            "orchestrator_status": "healthy",
            "agents": agents,
            "providers": provider_stats,
            "tools": self.registry.status(),
            "memory": memory_status,
            "sessions": self.sessions.status().await,
            "active_conversations": self.sessions.active_conversations().await,
            "timestamp": Utc::now().to_rfc3339(),
        })
    }
}
